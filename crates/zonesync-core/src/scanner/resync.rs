//! Periodic resync scanner
//!
//! Periodically forces a full re-sync of recently updated zones to
//! every target, even though no mutation is pending. This corrects
//! drift caused by missed notifications, backend restarts, or manual
//! out-of-band changes that the normal convergence path cannot see.

use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::config::ConvergenceConfig;
use crate::engine::ConvergenceEngine;
use crate::error::Result;
use crate::model::{Zone, ZoneAction, ZoneStatus};
use crate::traits::storage::{Storage, ZoneCriteria};

/// Periodic scanner that forces full zone re-syncs
pub struct PeriodicResyncScanner {
    storage: Arc<dyn Storage>,
    engine: Arc<ConvergenceEngine>,
    config: ConvergenceConfig,
}

impl PeriodicResyncScanner {
    /// Create a resync scanner
    pub fn new(
        storage: Arc<dyn Storage>,
        engine: Arc<ConvergenceEngine>,
        config: ConvergenceConfig,
    ) -> Self {
        Self {
            storage,
            engine,
            config,
        }
    }

    /// Run the scanner until a shutdown signal arrives
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run with an optional programmatic shutdown signal (for testing)
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let mut ticker = interval(Duration::from_secs(self.config.periodic_sync_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.scan().await {
                            error!(error = %e, "resync scan failed");
                        }
                    }
                    _ = &mut rx => {
                        info!("resync scanner shutting down");
                        break;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.scan().await {
                            error!(error = %e, "resync scan failed");
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("resync scanner shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Perform one scan, returning the number of zones resynced
    pub async fn scan(&self) -> Result<usize> {
        let mut criteria = ZoneCriteria::default();
        if let Some(window) = self.config.sync_window() {
            criteria = criteria.with_updated_within(window);
        }
        let zones = self.storage.find_zones(&criteria).await?;

        debug!(zones = zones.len(), "resync scan found candidate zones");

        let mut synced = 0;
        for zone in zones {
            if zone.status == ZoneStatus::Deleted {
                continue;
            }
            // An outstanding mutation owns the zone; it converges
            // through the normal path, never through a resync.
            if zone.action != ZoneAction::None {
                debug!(zone = %zone.name, action = %zone.action, "mutation outstanding, skipping resync");
                continue;
            }
            if self.resync_with_retries(&zone).await {
                synced += 1;
            }
        }

        Ok(synced)
    }

    /// Resync one zone with bounded attempts
    ///
    /// A zone still failing after `periodic_sync_max_attempts` is left
    /// for the next scheduled run rather than retried indefinitely.
    async fn resync_with_retries(&self, zone: &Zone) -> bool {
        let max_attempts = self.config.periodic_sync_max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.engine.resync_zone(zone).await {
                Ok(ZoneStatus::Active) => {
                    info!(zone = %zone.name, attempt, "resync complete");
                    return true;
                }
                Ok(status) => {
                    warn!(zone = %zone.name, attempt, %status, "resync did not converge");
                }
                Err(e) => {
                    warn!(zone = %zone.name, attempt, error = %e, "resync attempt failed");
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(Duration::from_secs(
                    self.config.periodic_sync_retry_interval_secs,
                ))
                .await;
            }
        }

        error!(
            zone = %zone.name,
            attempts = max_attempts,
            "resync attempts exhausted, leaving zone for the next run"
        );
        false
    }
}
