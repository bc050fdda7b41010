// # Convergence Tracker Trait
//
// Records the last known convergence state of a single backend target
// with respect to a single zone and action, keyed by
// `(target_id, zone_id, action)`.
//
// ## Persistence strategies
//
// - Volatile cache with TTL: entries silently vanish, forcing the
//   engine to treat the target as never polled (see
//   `crate::tracker::MemoryTracker`)
// - Durable file store surviving process restart (see
//   `crate::tracker::FileTracker`)
//
// Both are semantically equivalent from the engine's point of view.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::ZoneAction;

/// Last observed outcome of a (target, zone, action) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConvergenceOutcome {
    /// Action dispatched, confirmation outstanding
    Pending,
    /// Target confirmed the change
    Success,
    /// Target failed or timed out
    Error,
}

/// Tracked convergence state for one (target, zone, action) triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceStatus {
    /// Backend target id
    pub target_id: String,
    /// Zone id
    pub zone_id: String,
    /// Action this status applies to
    pub action: ZoneAction,
    /// Serial the action was driving toward
    pub serial: u32,
    /// Last observed outcome
    pub outcome: ConvergenceOutcome,
    /// Timestamp of the last overwrite
    pub updated_at: DateTime<Utc>,
}

impl ConvergenceStatus {
    /// Create a new status entry
    pub fn new(
        target_id: impl Into<String>,
        zone_id: impl Into<String>,
        action: ZoneAction,
        serial: u32,
        outcome: ConvergenceOutcome,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            zone_id: zone_id.into(),
            action,
            serial,
            outcome,
            updated_at: Utc::now(),
        }
    }

    /// Uniqueness key; at most one entry exists per key
    pub fn key(&self) -> String {
        status_key(&self.target_id, &self.zone_id, self.action)
    }

    /// Whether the entry is older than the given age
    pub fn is_stale(&self, max_age: chrono::Duration) -> bool {
        Utc::now().signed_duration_since(self.updated_at) > max_age
    }
}

/// Canonical map key for a (target, zone, action) triple
pub fn status_key(target_id: &str, zone_id: &str, action: ZoneAction) -> String {
    format!("{target_id}:{zone_id}:{action}")
}

/// Trait for convergence tracker implementations
///
/// # Thread Safety
///
/// Store/retrieve/clear must be safe under concurrent access from poll
/// workers operating on different zones. Keys are zone-scoped, so only
/// per-key atomicity is required.
#[async_trait]
pub trait ConvergenceTracker: Send + Sync {
    /// Upsert a status entry, overwriting any prior entry for its key
    async fn store(&self, status: ConvergenceStatus) -> Result<()>;

    /// Retrieve the entry for a key
    ///
    /// Returns [`crate::Error::NotFound`] when no entry exists,
    /// including TTL-expired volatile entries. Callers treat that as
    /// "no data yet", the expected state for a fresh zone.
    async fn retrieve(
        &self,
        target_id: &str,
        zone_id: &str,
        action: ZoneAction,
    ) -> Result<ConvergenceStatus>;

    /// Remove the entry for a key once the triple is retired
    ///
    /// Clearing an absent key is not an error.
    async fn clear(&self, target_id: &str, zone_id: &str, action: ZoneAction) -> Result<()>;
}
