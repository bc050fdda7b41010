//! Recovery scanner
//!
//! Periodically scans storage for zones stuck in PENDING (a crashed or
//! lost convergence run) and re-drives them through the engine. The
//! engine's per-zone guard keeps a scan from stomping on a run that is
//! still in flight.

use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::config::ConvergenceConfig;
use crate::engine::ConvergenceEngine;
use crate::error::Result;
use crate::model::{ZoneAction, ZoneStatus};
use crate::traits::storage::{Storage, ZoneCriteria};

/// Periodic scanner that re-drives stuck pending zones
pub struct RecoveryScanner {
    storage: Arc<dyn Storage>,
    engine: Arc<ConvergenceEngine>,
    interval_secs: u64,
}

impl RecoveryScanner {
    /// Create a recovery scanner
    pub fn new(
        storage: Arc<dyn Storage>,
        engine: Arc<ConvergenceEngine>,
        config: &ConvergenceConfig,
    ) -> Self {
        Self {
            storage,
            engine,
            interval_secs: config.periodic_recovery_interval_secs,
        }
    }

    /// Run the scanner until a shutdown signal arrives
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run with an optional programmatic shutdown signal (for testing)
    ///
    /// Scans are single-flight: a tick that fires while the previous
    /// scan is still running is delayed, never overlapped.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let mut ticker = interval(Duration::from_secs(self.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup does not
        // race the initial convergence runs.
        ticker.tick().await;

        if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.scan().await {
                            error!(error = %e, "recovery scan failed");
                        }
                    }
                    _ = &mut rx => {
                        info!("recovery scanner shutting down");
                        break;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.scan().await {
                            error!(error = %e, "recovery scan failed");
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("recovery scanner shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Perform one scan, returning the number of zones re-driven
    ///
    /// A single zone's failure never aborts the scan; the error is
    /// logged and the scan continues with the next zone.
    pub async fn scan(&self) -> Result<usize> {
        let criteria = ZoneCriteria::default().with_status(ZoneStatus::Pending);
        let zones = self.storage.find_zones(&criteria).await?;

        debug!(zones = zones.len(), "recovery scan found pending zones");

        let mut driven = 0;
        for zone in zones {
            if zone.action == ZoneAction::None {
                debug!(zone = %zone.name, "pending zone with no action, skipping");
                continue;
            }
            match self.engine.converge_zone(&zone).await {
                // A run was already in flight; the guard refused us.
                Ok(ZoneStatus::Pending) => {
                    debug!(zone = %zone.name, "convergence in flight, not re-driven");
                }
                Ok(status) => {
                    info!(zone = %zone.name, %status, "recovery re-drive complete");
                    driven += 1;
                }
                Err(e) => {
                    error!(zone = %zone.name, error = %e, "recovery re-drive failed");
                }
            }
        }

        Ok(driven)
    }
}
