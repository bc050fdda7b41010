// # Memory Tracker
//
// Volatile in-memory implementation of ConvergenceTracker.
//
// ## Crash Behavior
//
// All entries are lost on restart, and TTL-expired entries vanish
// silently. Both cases surface as NotFound, which the engine treats as
// "never polled" and re-drives the target. Tolerating a miss this way
// is what makes the volatile strategy semantically equivalent to the
// durable one.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::ZoneAction;
use crate::traits::tracker::{ConvergenceStatus, ConvergenceTracker, status_key};

/// In-memory convergence tracker with optional entry expiration
#[derive(Debug, Clone, Default)]
pub struct MemoryTracker {
    inner: Arc<RwLock<HashMap<String, ConvergenceStatus>>>,
    ttl: Option<chrono::Duration>,
}

impl MemoryTracker {
    /// Create a tracker whose entries never expire
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker whose entries expire after `ttl_secs`
    pub fn with_ttl(ttl_secs: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl: Some(chrono::Duration::seconds(ttl_secs as i64)),
        }
    }

    /// Number of live (non-expired) entries
    pub async fn len(&self) -> usize {
        let guard = self.inner.read().await;
        match self.ttl {
            Some(ttl) => guard.values().filter(|s| !s.is_stale(ttl)).count(),
            None => guard.len(),
        }
    }

    /// Whether the tracker holds no live entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ConvergenceTracker for MemoryTracker {
    async fn store(&self, status: ConvergenceStatus) -> Result<()> {
        let mut guard = self.inner.write().await;
        if let Some(ttl) = self.ttl {
            guard.retain(|_, s| !s.is_stale(ttl));
        }
        guard.insert(status.key(), status);
        Ok(())
    }

    async fn retrieve(
        &self,
        target_id: &str,
        zone_id: &str,
        action: ZoneAction,
    ) -> Result<ConvergenceStatus> {
        let key = status_key(target_id, zone_id, action);
        let guard = self.inner.read().await;
        match guard.get(&key) {
            Some(status) if self.ttl.is_none_or(|ttl| !status.is_stale(ttl)) => {
                Ok(status.clone())
            }
            _ => Err(Error::not_found(key)),
        }
    }

    async fn clear(&self, target_id: &str, zone_id: &str, action: ZoneAction) -> Result<()> {
        let key = status_key(target_id, zone_id, action);
        let mut guard = self.inner.write().await;
        guard.remove(&key);
        Ok(())
    }
}
