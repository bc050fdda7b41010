// # File Tracker
//
// Durable implementation of ConvergenceTracker backed by a JSON file.
//
// ## Crash Recovery
//
// - Atomic writes: state goes to a temp file, then rename
// - Backup: last known good state kept in a `.backup` file
// - Corruption: falls back to the backup on parse failure, then to an
//   empty state, which only costs a re-poll per the tracker contract
//
// ## File Format
//
// ```json
// {
//   "version": "1",
//   "entries": {
//     "target-1:zone-1:CREATE": {
//       "target_id": "target-1",
//       "zone_id": "zone-1",
//       "action": "CREATE",
//       "serial": 42,
//       "outcome": "SUCCESS",
//       "updated_at": "2026-08-29T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::ZoneAction;
use crate::traits::tracker::{ConvergenceStatus, ConvergenceTracker, status_key};

/// Tracker file format version, for future migration
const TRACKER_FILE_VERSION: &str = "1";

/// Durable file-backed convergence tracker
///
/// Survives process restart, which lets the recovery scanner pick up
/// convergence runs a crashed process left behind.
#[derive(Debug)]
pub struct FileTracker {
    path: PathBuf,
    entries: Arc<RwLock<HashMap<String, ConvergenceStatus>>>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct TrackerFileFormat {
    version: String,
    entries: HashMap<String, ConvergenceStatus>,
}

impl FileTracker {
    /// Create or load a file tracker
    ///
    /// Creates parent directories as needed and loads any existing
    /// state, recovering from the backup if the main file is corrupt.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::tracker(format!(
                        "failed to create tracker directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let entries = Self::load_with_recovery(&path).await;

        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    async fn load_with_recovery(path: &Path) -> HashMap<String, ConvergenceStatus> {
        match Self::load(path).await {
            Ok(entries) => {
                debug!(entries = entries.len(), "loaded tracker state");
                entries
            }
            Err(e) => {
                warn!(error = %e, "tracker file unreadable, trying backup");
                match Self::load(&Self::backup_path(path)).await {
                    Ok(entries) => {
                        debug!(entries = entries.len(), "recovered tracker state from backup");
                        entries
                    }
                    Err(backup_err) => {
                        // A lost tracker only forces a re-poll, so an
                        // empty state is an acceptable recovery.
                        warn!(error = %backup_err, "backup unreadable, starting empty");
                        HashMap::new()
                    }
                }
            }
        }
    }

    async fn load(path: &Path) -> Result<HashMap<String, ConvergenceStatus>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await?;
        let file: TrackerFileFormat = serde_json::from_str(&content)?;

        if file.version != TRACKER_FILE_VERSION {
            warn!(
                expected = TRACKER_FILE_VERSION,
                found = %file.version,
                "tracker file version mismatch, loading anyway"
            );
        }

        Ok(file.entries)
    }

    /// Write the current state atomically (temp file + rename)
    async fn persist(&self) -> Result<()> {
        let entries = self.entries.read().await.clone();
        let file = TrackerFileFormat {
            version: TRACKER_FILE_VERSION.to_string(),
            entries,
        };
        let json = serde_json::to_string_pretty(&file)?;

        let temp_path = self.path.with_extension("tmp");
        {
            let mut temp = fs::File::create(&temp_path).await?;
            temp.write_all(json.as_bytes()).await?;
            temp.flush().await?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                warn!(error = %e, "failed to refresh tracker backup");
            }
        }

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    fn backup_path(path: &Path) -> PathBuf {
        path.with_extension("backup")
    }
}

#[async_trait]
impl ConvergenceTracker for FileTracker {
    async fn store(&self, status: ConvergenceStatus) -> Result<()> {
        {
            let mut guard = self.entries.write().await;
            guard.insert(status.key(), status);
        }
        self.persist().await
    }

    async fn retrieve(
        &self,
        target_id: &str,
        zone_id: &str,
        action: ZoneAction,
    ) -> Result<ConvergenceStatus> {
        let key = status_key(target_id, zone_id, action);
        let guard = self.entries.read().await;
        guard.get(&key).cloned().ok_or_else(|| Error::not_found(key))
    }

    async fn clear(&self, target_id: &str, zone_id: &str, action: ZoneAction) -> Result<()> {
        let key = status_key(target_id, zone_id, action);
        let removed = {
            let mut guard = self.entries.write().await;
            guard.remove(&key).is_some()
        };
        if removed {
            self.persist().await?;
        }
        Ok(())
    }
}
