// # Convergence Tracker Implementations
//
// Two interchangeable persistence strategies for the tracker contract:
// a volatile TTL cache and a durable file store.

use std::sync::Arc;

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::traits::ConvergenceTracker;

pub mod file;
pub mod memory;

pub use file::FileTracker;
pub use memory::MemoryTracker;

/// Build a tracker from configuration
pub async fn create_tracker(config: &TrackerConfig) -> Result<Arc<dyn ConvergenceTracker>> {
    match config {
        TrackerConfig::Memory => Ok(Arc::new(MemoryTracker::new())),
        TrackerConfig::MemoryWithTtl { ttl_secs } => {
            Ok(Arc::new(MemoryTracker::with_ttl(*ttl_secs)))
        }
        TrackerConfig::File { path } => Ok(Arc::new(FileTracker::new(path).await?)),
    }
}
