//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides a scriptable backend adapter and config helpers
//! that verify convergence constraints without a real DNS server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use zonesync_core::error::{Error, Result};
use zonesync_core::model::{PoolTarget, Record, Zone, ZoneKind};
use zonesync_core::traits::backend::{BackendAdapter, PingStatus};
use zonesync_core::{ConvergenceConfig, MemoryStorage, MemoryTracker, Storage};

/// Scripted outcome for a backend verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbOutcome {
    Ok,
    NotFound,
    Duplicate,
    CommFailure,
}

struct MockInner {
    create_zone_calls: AtomicUsize,
    delete_zone_calls: AtomicUsize,
    create_record_calls: AtomicUsize,
    update_record_calls: AtomicUsize,
    delete_record_calls: AtomicUsize,
    create_zone_outcome: Mutex<VerbOutcome>,
    delete_zone_outcome: Mutex<VerbOutcome>,
    created_records: Mutex<Vec<String>>,
    observed_serial: Mutex<Option<u32>>,
    auto_confirm: AtomicBool,
    unreachable: AtomicBool,
    verb_delay: Mutex<Duration>,
}

/// A mock backend adapter with scriptable verb outcomes
///
/// Counters and scripted outcomes live behind an `Arc`, so a
/// [`MockBackend::handle`] clone given to the engine shares state with
/// the instance the test keeps for assertions.
pub struct MockBackend {
    name: String,
    polling: bool,
    inner: Arc<MockInner>,
}

impl MockBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            polling: false,
            inner: Arc::new(MockInner {
                create_zone_calls: AtomicUsize::new(0),
                delete_zone_calls: AtomicUsize::new(0),
                create_record_calls: AtomicUsize::new(0),
                update_record_calls: AtomicUsize::new(0),
                delete_record_calls: AtomicUsize::new(0),
                create_zone_outcome: Mutex::new(VerbOutcome::Ok),
                delete_zone_outcome: Mutex::new(VerbOutcome::Ok),
                created_records: Mutex::new(Vec::new()),
                observed_serial: Mutex::new(None),
                auto_confirm: AtomicBool::new(true),
                unreachable: AtomicBool::new(false),
                verb_delay: Mutex::new(Duration::ZERO),
            }),
        }
    }

    /// Enable serial polling (confirmation via `find_serial`)
    pub fn with_polling(mut self) -> Self {
        self.polling = true;
        self
    }

    /// Create a handle that shares counters and scripted state
    pub fn handle(&self) -> Self {
        Self {
            name: self.name.clone(),
            polling: self.polling,
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn set_create_zone_outcome(&self, outcome: VerbOutcome) {
        *self.inner.create_zone_outcome.lock().unwrap() = outcome;
    }

    pub fn set_delete_zone_outcome(&self, outcome: VerbOutcome) {
        *self.inner.delete_zone_outcome.lock().unwrap() = outcome;
    }

    /// When disabled, successful verbs stop moving the observed serial,
    /// so a polling target never confirms
    pub fn set_auto_confirm(&self, auto_confirm: bool) {
        self.inner.auto_confirm.store(auto_confirm, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn set_verb_delay(&self, delay: Duration) {
        *self.inner.verb_delay.lock().unwrap() = delay;
    }

    pub fn set_observed_serial(&self, serial: Option<u32>) {
        *self.inner.observed_serial.lock().unwrap() = serial;
    }

    pub fn create_zone_calls(&self) -> usize {
        self.inner.create_zone_calls.load(Ordering::SeqCst)
    }

    pub fn delete_zone_calls(&self) -> usize {
        self.inner.delete_zone_calls.load(Ordering::SeqCst)
    }

    pub fn create_record_calls(&self) -> usize {
        self.inner.create_record_calls.load(Ordering::SeqCst)
    }

    pub fn update_record_calls(&self) -> usize {
        self.inner.update_record_calls.load(Ordering::SeqCst)
    }

    pub fn delete_record_calls(&self) -> usize {
        self.inner.delete_record_calls.load(Ordering::SeqCst)
    }

    /// Names of records created through this backend, in call order
    pub fn created_records(&self) -> Vec<String> {
        self.inner.created_records.lock().unwrap().clone()
    }

    async fn delay(&self) {
        let delay = *self.inner.verb_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_reachable(&self) -> Result<()> {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(Error::communication(&self.name, "injected failure"));
        }
        Ok(())
    }

    fn apply(&self, outcome: VerbOutcome, subject: &str) -> Result<()> {
        match outcome {
            VerbOutcome::Ok => Ok(()),
            VerbOutcome::NotFound => Err(Error::not_found(subject)),
            VerbOutcome::Duplicate => Err(Error::duplicate(subject)),
            VerbOutcome::CommFailure => Err(Error::communication(&self.name, "injected failure")),
        }
    }
}

#[async_trait::async_trait]
impl BackendAdapter for MockBackend {
    async fn create_zone(&self, zone: &Zone) -> Result<()> {
        self.inner.create_zone_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.check_reachable()?;

        let outcome = *self.inner.create_zone_outcome.lock().unwrap();
        self.apply(outcome, &zone.name)?;

        if self.inner.auto_confirm.load(Ordering::SeqCst) {
            *self.inner.observed_serial.lock().unwrap() = Some(zone.serial);
        }
        Ok(())
    }

    async fn delete_zone(&self, zone: &Zone) -> Result<()> {
        self.inner.delete_zone_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.check_reachable()?;

        let outcome = *self.inner.delete_zone_outcome.lock().unwrap();
        self.apply(outcome, &zone.name)?;

        if self.inner.auto_confirm.load(Ordering::SeqCst) {
            *self.inner.observed_serial.lock().unwrap() = None;
        }
        Ok(())
    }

    async fn create_record(&self, _zone: &Zone, record: &Record) -> Result<()> {
        self.inner.create_record_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.inner
            .created_records
            .lock()
            .unwrap()
            .push(record.name.clone());
        Ok(())
    }

    async fn update_record(&self, _zone: &Zone, _record: &Record) -> Result<()> {
        self.inner.update_record_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()
    }

    async fn delete_record(&self, _zone: &Zone, _record: &Record) -> Result<()> {
        self.inner.delete_record_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()
    }

    async fn ping(&self) -> PingStatus {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            PingStatus::down("injected failure")
        } else {
            PingStatus::up()
        }
    }

    fn supports_serial_polling(&self) -> bool {
        self.polling
    }

    async fn find_serial(&self, _zone_name: &str) -> Result<Option<u32>> {
        self.check_reachable()?;
        Ok(*self.inner.observed_serial.lock().unwrap())
    }

    fn backend_name(&self) -> &str {
        &self.name
    }
}

/// A primary test zone with a pending CREATE action
pub fn primary_zone(name: &str) -> Zone {
    Zone::new(
        name,
        ZoneKind::Primary {
            email: "hostmaster@example.com".to_string(),
        },
        "pool-1",
    )
}

/// An eligible pool target for the mock backend
pub fn target(id: &str) -> PoolTarget {
    PoolTarget::new(id, "mock")
}

/// Engine configuration with all delays zeroed for fast tests
pub fn fast_config() -> ConvergenceConfig {
    ConvergenceConfig {
        threshold_percentage: 100,
        poll_timeout_secs: 5,
        poll_retry_interval_secs: 0,
        poll_max_retries: 3,
        poll_delay_secs: 0,
        periodic_sync_max_attempts: 2,
        periodic_sync_retry_interval_secs: 0,
        event_channel_capacity: 100,
        ..Default::default()
    }
}

/// Storage pre-seeded with the given zones
pub async fn seeded_storage(zones: &[Zone]) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    for zone in zones {
        storage.insert_zone(zone.clone()).await;
    }
    storage
}

/// Shared handles for a ready-to-use engine stack
pub fn fresh_tracker() -> Arc<MemoryTracker> {
    Arc::new(MemoryTracker::new())
}

/// Upcast helper; the engine constructors take trait objects
pub fn as_storage(storage: &Arc<MemoryStorage>) -> Arc<dyn Storage> {
    Arc::clone(storage) as Arc<dyn Storage>
}
