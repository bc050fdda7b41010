// # Storage Trait
//
// Interface to the central authoritative datastore. The convergence
// core only reads zones/records and writes the zone status field; CRUD
// validation, pagination, and schema concerns live with the API layer
// that owns the datastore.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Record, Zone, ZoneAction, ZoneStatus};

/// Filter criteria for zone lookups
#[derive(Debug, Clone, Default)]
pub struct ZoneCriteria {
    /// Match a specific status
    pub status: Option<ZoneStatus>,
    /// Match a specific outstanding action
    pub action: Option<ZoneAction>,
    /// Match zones owned by a pool
    pub pool_id: Option<String>,
    /// Match zones updated within a trailing window
    pub updated_within: Option<chrono::Duration>,
}

impl ZoneCriteria {
    /// Filter by status
    pub fn with_status(mut self, status: ZoneStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filter by action
    pub fn with_action(mut self, action: ZoneAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Filter by owning pool
    pub fn with_pool(mut self, pool_id: impl Into<String>) -> Self {
        self.pool_id = Some(pool_id.into());
        self
    }

    /// Filter by trailing update window
    pub fn with_updated_within(mut self, window: chrono::Duration) -> Self {
        self.updated_within = Some(window);
        self
    }

    /// Whether a zone matches every set criterion
    pub fn matches(&self, zone: &Zone) -> bool {
        if let Some(status) = self.status {
            if zone.status != status {
                return false;
            }
        }
        if let Some(action) = self.action {
            if zone.action != action {
                return false;
            }
        }
        if let Some(pool_id) = &self.pool_id {
            if &zone.pool_id != pool_id {
                return false;
            }
        }
        if let Some(window) = self.updated_within {
            if !zone.updated_within(window) {
                return false;
            }
        }
        true
    }
}

/// Trait for the authoritative zone datastore
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// The engine guarantees at most one concurrent convergence run per
/// zone, so `update_zone_status` is never raced for the same zone id.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch a zone by id
    ///
    /// Returns [`crate::Error::NotFound`] for unknown ids.
    async fn get_zone(&self, zone_id: &str) -> Result<Zone>;

    /// Find zones matching the criteria
    async fn find_zones(&self, criteria: &ZoneCriteria) -> Result<Vec<Zone>>;

    /// Persist a zone's convergence outcome
    ///
    /// Writes status, the serial the outcome applies to, and the
    /// (usually cleared) action field in one call.
    async fn update_zone_status(
        &self,
        zone_id: &str,
        status: ZoneStatus,
        serial: u32,
        action: ZoneAction,
    ) -> Result<()>;

    /// Fetch all records of a zone
    ///
    /// Needed for slave-recreate compensation and for full zone
    /// rebuilds during resync.
    async fn find_records(&self, zone_id: &str) -> Result<Vec<Record>>;
}
