//! Core convergence engine
//!
//! The ConvergenceEngine drives a single zone mutation out to every
//! configured backend target and computes the zone's terminal status.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    PENDING zone     ┌────────────────────┐
//! │   Storage    │────────────────────▶│ ConvergenceEngine  │
//! └──────────────┘                     └────────────────────┘
//!        ▲                                       │ concurrent fan-out
//!        │ status ACTIVE/ERROR/DELETED           ▼
//!        │                     ┌─────────┐ ┌─────────┐ ┌─────────┐
//!        └─────────────────────│ target1 │ │ target2 │ │ targetN │
//!                              └─────────┘ └─────────┘ └─────────┘
//!                                       │ outcomes
//!                                       ▼
//!                              ┌────────────────────┐
//!                              │ ConvergenceTracker │
//!                              └────────────────────┘
//! ```
//!
//! ## Per-target state machine
//!
//! `NotSent → Sent → Confirmed | Failed | TimedOut`
//!
//! The fan-out is a barrier/join, not fail-fast: every target gets its
//! full timeout/retry budget independently, and a single unreachable
//! target can never block convergence reporting for the others beyond
//! that budget.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ConvergenceConfig;
use crate::error::Result;
use crate::model::{PoolTarget, Record, Zone, ZoneAction, ZoneStatus};
use crate::traits::backend::BackendAdapter;
use crate::traits::storage::Storage;
use crate::traits::tracker::{ConvergenceOutcome, ConvergenceStatus, ConvergenceTracker};

/// Per-(zone, target) convergence state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Action not yet dispatched
    NotSent,
    /// Action dispatched, confirmation outstanding
    Sent,
    /// Target confirmed the change
    Confirmed,
    /// Target rejected the change
    Failed,
    /// Confirmation retries exhausted
    TimedOut,
}

/// Outcome of driving one target
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    /// Target id
    pub target_id: String,
    /// Terminal state reached
    pub state: TargetState,
    /// Confirmation poll attempts spent
    pub attempts: u32,
    /// Failure description, if any
    pub error: Option<String>,
}

/// Events emitted by the ConvergenceEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A convergence run started for a zone
    ConvergenceStarted {
        zone_id: String,
        zone_name: String,
        action: ZoneAction,
    },

    /// A run was skipped because one is already in flight for the zone
    ConvergenceSkipped { zone_id: String, reason: String },

    /// A target was excluded from the threshold denominator
    TargetExcluded { zone_id: String, target_id: String },

    /// A target confirmed the change
    TargetConfirmed { zone_id: String, target_id: String },

    /// A target failed the change
    TargetFailed {
        zone_id: String,
        target_id: String,
        error: String,
    },

    /// A target exhausted its confirmation retries
    TargetTimedOut {
        zone_id: String,
        target_id: String,
        attempts: u32,
    },

    /// The zone reached a terminal status
    ZoneStatusChanged {
        zone_id: String,
        status: ZoneStatus,
    },
}

/// Core convergence engine
///
/// Holds the storage and tracker handles, the pool's targets with their
/// instantiated adapters, and the per-zone in-flight guard that
/// guarantees at most one concurrent convergence run per zone.
///
/// ## Threading
///
/// All methods take `&self`; the engine is shared across scanner tasks
/// behind an `Arc`. Concurrent calls for different zones proceed in
/// parallel; a second call for the same zone no-ops.
pub struct ConvergenceEngine {
    storage: Arc<dyn Storage>,
    tracker: Arc<dyn ConvergenceTracker>,
    targets: Vec<(PoolTarget, Arc<dyn BackendAdapter>)>,
    config: ConvergenceConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ConvergenceEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver); the receiver yields engine
    /// events for external monitoring.
    pub fn new(
        storage: Arc<dyn Storage>,
        tracker: Arc<dyn ConvergenceTracker>,
        targets: Vec<(PoolTarget, Arc<dyn BackendAdapter>)>,
        config: ConvergenceConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            storage,
            tracker,
            targets,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Drive the zone's outstanding action to all targets
    ///
    /// Returns the terminal status the zone reached. If a run is
    /// already in flight for this zone, returns `Pending` without
    /// touching any target.
    pub async fn converge_zone(&self, zone: &Zone) -> Result<ZoneStatus> {
        zone.validate()?;

        if zone.action == ZoneAction::None {
            debug!(zone = %zone.name, "no outstanding action, nothing to converge");
            return Ok(zone.status);
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &zone.id) else {
            self.emit(EngineEvent::ConvergenceSkipped {
                zone_id: zone.id.clone(),
                reason: "convergence already in flight".to_string(),
            });
            debug!(zone = %zone.name, "convergence already in flight, skipping");
            return Ok(ZoneStatus::Pending);
        };

        self.drive(zone, zone.action, None).await
    }

    /// Force a full re-sync of the zone to every target
    ///
    /// Used by the periodic resync scanner to correct silent drift:
    /// the update verb is driven even though no mutation is pending
    /// (adapters without a native update fall back to delete+create),
    /// and the zone's stored records are replayed afterwards.
    pub async fn resync_zone(&self, zone: &Zone) -> Result<ZoneStatus> {
        zone.validate()?;

        // A zone with an outstanding mutation converges through
        // `converge_zone`; resyncing it would overwrite the mutation.
        if zone.action != ZoneAction::None {
            return Err(crate::error::Error::invalid_zone(
                &zone.name,
                format!("outstanding {} action, cannot resync", zone.action),
            ));
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &zone.id) else {
            self.emit(EngineEvent::ConvergenceSkipped {
                zone_id: zone.id.clone(),
                reason: "convergence already in flight".to_string(),
            });
            return Ok(ZoneStatus::Pending);
        };

        let records = self.storage.find_records(&zone.id).await?;
        self.drive(zone, ZoneAction::Update, Some(records)).await
    }

    async fn drive(
        &self,
        zone: &Zone,
        action: ZoneAction,
        records: Option<Vec<Record>>,
    ) -> Result<ZoneStatus> {
        self.emit(EngineEvent::ConvergenceStarted {
            zone_id: zone.id.clone(),
            zone_name: zone.name.clone(),
            action,
        });

        let mut eligible = Vec::new();
        for (target, adapter) in &self.targets {
            if target.is_eligible() {
                eligible.push((target.clone(), Arc::clone(adapter)));
            } else {
                debug!(
                    zone = %zone.name,
                    target = %target.id,
                    "target excluded from threshold denominator"
                );
                self.emit(EngineEvent::TargetExcluded {
                    zone_id: zone.id.clone(),
                    target_id: target.id.clone(),
                });
            }
        }

        let status = if eligible.is_empty() {
            // Nothing can refuse the change, so the threshold holds
            // vacuously.
            warn!(zone = %zone.name, "no eligible targets in pool");
            terminal_status(action, true)
        } else {
            self.drive_eligible(zone, action, records, eligible).await
        };

        self.storage
            .update_zone_status(&zone.id, status, zone.serial, ZoneAction::None)
            .await?;

        // Entries for superseded actions are retired; the current
        // action's entry stays as the last known state, unless the
        // zone is gone everywhere.
        for (target, _) in &self.targets {
            for retired in [ZoneAction::Create, ZoneAction::Update, ZoneAction::Delete] {
                if retired == action && status != ZoneStatus::Deleted {
                    continue;
                }
                if let Err(e) = self.tracker.clear(&target.id, &zone.id, retired).await {
                    warn!(zone = %zone.name, target = %target.id, error = %e, "tracker clear failed");
                }
            }
        }

        self.emit(EngineEvent::ZoneStatusChanged {
            zone_id: zone.id.clone(),
            status,
        });
        info!(zone = %zone.name, %action, %status, "convergence run complete");

        Ok(status)
    }

    async fn drive_eligible(
        &self,
        zone: &Zone,
        action: ZoneAction,
        records: Option<Vec<Record>>,
        eligible: Vec<(PoolTarget, Arc<dyn BackendAdapter>)>,
    ) -> ZoneStatus {
        let total = eligible.len();

        for (target, _) in &eligible {
            let pending = ConvergenceStatus::new(
                &target.id,
                &zone.id,
                action,
                zone.serial,
                ConvergenceOutcome::Pending,
            );
            if let Err(e) = self.tracker.store(pending).await {
                warn!(zone = %zone.name, target = %target.id, error = %e, "tracker store failed");
            }
        }

        let records = records.map(Arc::new);
        let mut tasks = JoinSet::new();
        for (target, adapter) in eligible {
            let zone = zone.clone();
            let config = self.config.clone();
            let records = records.clone();
            tasks.spawn(async move {
                drive_target(target.id, adapter, zone, action, records, config).await
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                // A panicked task counts against the denominator
                // because `total` is fixed above.
                Err(e) => error!(zone = %zone.name, error = %e, "target task failed"),
            }
        }

        for outcome in &outcomes {
            self.record_outcome(zone, action, outcome).await;
        }

        let confirmed = outcomes
            .iter()
            .filter(|o| o.state == TargetState::Confirmed)
            .count();

        // Integer arithmetic on purpose: float division at exact
        // boundary values (2/3 vs 67%) is ambiguous.
        let met = (confirmed as u64) * 100 >= (total as u64) * u64::from(self.config.threshold_percentage);
        debug!(
            zone = %zone.name,
            confirmed,
            total,
            threshold = self.config.threshold_percentage,
            met,
            "threshold decision"
        );

        terminal_status(action, met)
    }

    async fn record_outcome(&self, zone: &Zone, action: ZoneAction, outcome: &TargetOutcome) {
        let tracked = match outcome.state {
            TargetState::Confirmed => ConvergenceOutcome::Success,
            TargetState::Failed | TargetState::TimedOut => ConvergenceOutcome::Error,
            TargetState::NotSent | TargetState::Sent => ConvergenceOutcome::Pending,
        };
        let status = ConvergenceStatus::new(
            &outcome.target_id,
            &zone.id,
            action,
            zone.serial,
            tracked,
        );
        if let Err(e) = self.tracker.store(status).await {
            warn!(zone = %zone.name, target = %outcome.target_id, error = %e, "tracker store failed");
        }

        match outcome.state {
            TargetState::Confirmed => self.emit(EngineEvent::TargetConfirmed {
                zone_id: zone.id.clone(),
                target_id: outcome.target_id.clone(),
            }),
            TargetState::TimedOut => self.emit(EngineEvent::TargetTimedOut {
                zone_id: zone.id.clone(),
                target_id: outcome.target_id.clone(),
                attempts: outcome.attempts,
            }),
            _ => self.emit(EngineEvent::TargetFailed {
                zone_id: zone.id.clone(),
                target_id: outcome.target_id.clone(),
                error: outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown failure".to_string()),
            }),
        }
    }

    fn emit(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            // Dropping is preferable to unbounded growth when event
            // consumers fall behind.
            warn!("event channel full, dropping engine event");
        }
    }
}

/// Drive one target through dispatch and confirmation polling
async fn drive_target(
    target_id: String,
    adapter: Arc<dyn BackendAdapter>,
    zone: Zone,
    action: ZoneAction,
    records: Option<Arc<Vec<Record>>>,
    config: ConvergenceConfig,
) -> TargetOutcome {
    let backend = adapter.backend_name().to_string();
    let mut dispatch_error = None;

    let verb = async {
        match action {
            ZoneAction::Create => adapter.create_zone(&zone).await,
            ZoneAction::Update | ZoneAction::None => adapter.update_zone(&zone).await,
            ZoneAction::Delete => adapter.delete_zone(&zone).await,
        }
    };

    let mut sent_ok = match timeout(config.poll_timeout(), verb).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) if action == ZoneAction::Delete && e.is_not_found() => {
            // Absence is the goal state of a delete.
            debug!(%backend, zone = %zone.name, "zone already absent, delete confirmed");
            return TargetOutcome {
                target_id,
                state: TargetState::Confirmed,
                attempts: 0,
                error: None,
            };
        }
        Ok(Err(e)) => {
            // Dispatch failure does not abort the run; the target
            // proceeds straight to the confirmation phase.
            warn!(%backend, zone = %zone.name, error = %e, "dispatch failed");
            dispatch_error = Some(e.to_string());
            false
        }
        Err(_) => {
            warn!(%backend, zone = %zone.name, "dispatch timed out");
            dispatch_error = Some("dispatch timed out".to_string());
            false
        }
    };

    // Record replay happens only on resync runs.
    if sent_ok {
        if let Some(records) = &records {
            for record in records.iter() {
                match timeout(config.poll_timeout(), adapter.create_record(&zone, record)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) if e.is_duplicate() => {}
                    Ok(Err(e)) => {
                        warn!(%backend, zone = %zone.name, error = %e, "record replay failed");
                        dispatch_error = Some(e.to_string());
                        sent_ok = false;
                        break;
                    }
                    Err(_) => {
                        dispatch_error = Some("record replay timed out".to_string());
                        sent_ok = false;
                        break;
                    }
                }
            }
        }
    }

    if !adapter.supports_serial_polling() {
        // Synchronous backend: the verb outcome is the confirmation.
        let state = if sent_ok {
            TargetState::Confirmed
        } else {
            TargetState::Failed
        };
        return TargetOutcome {
            target_id,
            state,
            attempts: 0,
            error: dispatch_error,
        };
    }

    tokio::time::sleep(config.poll_delay()).await;

    for attempt in 1..=config.poll_max_retries {
        match timeout(config.poll_timeout(), adapter.find_serial(&zone.name)).await {
            Ok(Ok(observed)) => {
                let confirmed = match action {
                    ZoneAction::Delete => observed.is_none(),
                    _ => observed.is_some_and(|serial| serial >= zone.serial),
                };
                if confirmed {
                    debug!(%backend, zone = %zone.name, attempt, "target confirmed");
                    return TargetOutcome {
                        target_id,
                        state: TargetState::Confirmed,
                        attempts: attempt,
                        error: None,
                    };
                }
                debug!(%backend, zone = %zone.name, attempt, ?observed, "not yet converged");
            }
            Ok(Err(e)) if action == ZoneAction::Delete && e.is_not_found() => {
                return TargetOutcome {
                    target_id,
                    state: TargetState::Confirmed,
                    attempts: attempt,
                    error: None,
                };
            }
            Ok(Err(e)) => debug!(%backend, zone = %zone.name, attempt, error = %e, "serial poll failed"),
            Err(_) => debug!(%backend, zone = %zone.name, attempt, "serial poll timed out"),
        }

        if attempt < config.poll_max_retries {
            tokio::time::sleep(config.poll_retry_interval()).await;
        }
    }

    warn!(%backend, zone = %zone.name, "confirmation retries exhausted");
    TargetOutcome {
        target_id,
        state: TargetState::TimedOut,
        attempts: config.poll_max_retries,
        error: dispatch_error,
    }
}

fn terminal_status(action: ZoneAction, threshold_met: bool) -> ZoneStatus {
    match (threshold_met, action) {
        (true, ZoneAction::Delete) => ZoneStatus::Deleted,
        (true, _) => ZoneStatus::Active,
        (false, _) => ZoneStatus::Error,
    }
}

/// RAII guard for the per-zone advisory lock
///
/// Acquisition fails (returns `None`) when the zone already has an
/// in-flight run; the id is released again on drop.
struct InFlightGuard {
    zones: Arc<Mutex<HashSet<String>>>,
    zone_id: String,
}

impl InFlightGuard {
    fn acquire(zones: &Arc<Mutex<HashSet<String>>>, zone_id: &str) -> Option<Self> {
        let mut guard = zones.lock().unwrap();
        if guard.insert(zone_id.to_string()) {
            Some(Self {
                zones: Arc::clone(zones),
                zone_id: zone_id.to_string(),
            })
        } else {
            None
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.zones.lock() {
            guard.remove(&self.zone_id);
        }
    }
}
