//! In-memory reference backend adapter
//!
//! Holds zones and records in a process-local map. Used as the reference
//! implementation of the adapter contract and as a deterministic backend
//! for the daemon's default configuration and for tests.
//!
//! ## Adapter policy
//!
//! - Create of an existing zone with the same serial is equivalent and
//!   masked; a different serial surfaces [`Error::Duplicate`].
//! - Delete of an absent zone or record is masked.
//! - No native update primitive: the delete-then-create fallback from
//!   the adapter trait applies.
//! - Serial polling is supported; `find_serial` reads the stored serial.
//!
//! Fault injection via [`MemoryBackend::set_unreachable`] makes every
//! verb surface a communication failure, which is how tests exercise the
//! engine's partial-failure paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use zonesync_core::error::{Error, Result};
use zonesync_core::model::{PoolTarget, Record, Zone};
use zonesync_core::registry::BackendRegistry;
use zonesync_core::traits::backend::{BackendAdapter, BackendFactory, PingStatus};

/// Registry kind under which this adapter registers
pub const BACKEND_KIND: &str = "memory";

/// One zone as stored on the backend
#[derive(Debug, Clone)]
struct StoredZone {
    serial: u32,
    records: HashMap<String, Record>,
}

/// In-memory DNS backend
pub struct MemoryBackend {
    name: String,
    zones: Arc<RwLock<HashMap<String, StoredZone>>>,
    unreachable: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend with a logging name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zones: Arc::new(RwLock::new(HashMap::new())),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Simulate a network partition
    ///
    /// While set, every verb and `find_serial` surface a communication
    /// failure and ping reports down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of zones currently held
    pub async fn zone_count(&self) -> usize {
        self.zones.read().await.len()
    }

    /// Whether a zone is present
    pub async fn has_zone(&self, zone_name: &str) -> bool {
        self.zones.read().await.contains_key(zone_name)
    }

    /// Records currently held for a zone
    pub async fn records_of(&self, zone_name: &str) -> Vec<Record> {
        self.zones
            .read()
            .await
            .get(zone_name)
            .map(|stored| stored.records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::communication(&self.name, "backend unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendAdapter for MemoryBackend {
    async fn create_zone(&self, zone: &Zone) -> Result<()> {
        self.check_reachable()?;
        let mut zones = self.zones.write().await;

        if let Some(stored) = zones.get(&zone.name) {
            if stored.serial == zone.serial {
                debug!(backend = %self.name, zone = %zone.name, "zone already present at this serial");
                return Ok(());
            }
            return Err(Error::duplicate(&zone.name));
        }

        zones.insert(
            zone.name.clone(),
            StoredZone {
                serial: zone.serial,
                records: HashMap::new(),
            },
        );
        debug!(backend = %self.name, zone = %zone.name, serial = zone.serial, "zone created");
        Ok(())
    }

    async fn delete_zone(&self, zone: &Zone) -> Result<()> {
        self.check_reachable()?;
        let mut zones = self.zones.write().await;

        if zones.remove(&zone.name).is_none() {
            debug!(backend = %self.name, zone = %zone.name, "zone already absent on delete");
        }
        Ok(())
    }

    async fn create_record(&self, zone: &Zone, record: &Record) -> Result<()> {
        self.check_reachable()?;
        let mut zones = self.zones.write().await;

        let stored = zones
            .get_mut(&zone.name)
            .ok_or_else(|| Error::not_found(&zone.name))?;
        stored.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_record(&self, zone: &Zone, record: &Record) -> Result<()> {
        self.check_reachable()?;
        let mut zones = self.zones.write().await;

        let stored = zones
            .get_mut(&zone.name)
            .ok_or_else(|| Error::not_found(&zone.name))?;
        if !stored.records.contains_key(&record.id) {
            return Err(Error::not_found(&record.id));
        }
        stored.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete_record(&self, zone: &Zone, record: &Record) -> Result<()> {
        self.check_reachable()?;
        let mut zones = self.zones.write().await;

        if let Some(stored) = zones.get_mut(&zone.name) {
            stored.records.remove(&record.id);
        }
        Ok(())
    }

    async fn ping(&self) -> PingStatus {
        if self.unreachable.load(Ordering::SeqCst) {
            PingStatus::down("backend unreachable")
        } else {
            PingStatus::up()
        }
    }

    fn supports_serial_polling(&self) -> bool {
        true
    }

    async fn find_serial(&self, zone_name: &str) -> Result<Option<u32>> {
        self.check_reachable()?;
        Ok(self
            .zones
            .read()
            .await
            .get(zone_name)
            .map(|stored| stored.serial))
    }

    fn backend_name(&self) -> &str {
        &self.name
    }
}

/// Factory for the in-memory backend
///
/// Honors an optional `name` target option for the logging name;
/// defaults to the target id.
pub struct MemoryBackendFactory;

impl BackendFactory for MemoryBackendFactory {
    fn create(&self, target: &PoolTarget) -> Result<Arc<dyn BackendAdapter>> {
        let name = target
            .options
            .get("name")
            .cloned()
            .unwrap_or_else(|| target.id.clone());
        Ok(Arc::new(MemoryBackend::new(name)))
    }
}

/// Register this adapter's factory under its kind name
pub fn register(registry: &BackendRegistry) {
    registry.register(BACKEND_KIND, Arc::new(MemoryBackendFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_core::model::ZoneKind;

    fn zone(name: &str) -> Zone {
        Zone::new(
            name,
            ZoneKind::Primary {
                email: "hostmaster@example.com".to_string(),
            },
            "pool-1",
        )
    }

    #[tokio::test]
    async fn create_then_find_serial() {
        let backend = MemoryBackend::new("mem");
        let z = zone("example.com.");

        backend.create_zone(&z).await.unwrap();

        assert_eq!(backend.find_serial("example.com.").await.unwrap(), Some(z.serial));
        assert_eq!(backend.find_serial("other.com.").await.unwrap(), None);
    }

    #[tokio::test]
    async fn create_is_masked_at_same_serial_only() {
        let backend = MemoryBackend::new("mem");
        let mut z = zone("example.com.");

        backend.create_zone(&z).await.unwrap();
        backend.create_zone(&z).await.unwrap();

        z.serial += 1;
        let result = backend.create_zone(&z).await;
        assert!(matches!(result, Err(Error::Duplicate(_))));
    }

    #[tokio::test]
    async fn delete_of_absent_zone_is_masked() {
        let backend = MemoryBackend::new("mem");
        let z = zone("example.com.");

        backend.delete_zone(&z).await.unwrap();
        assert_eq!(backend.zone_count().await, 0);
    }

    #[tokio::test]
    async fn default_update_falls_back_to_delete_then_create() {
        let backend = MemoryBackend::new("mem");
        let mut z = zone("example.com.");
        backend.create_zone(&z).await.unwrap();

        z.serial += 1;
        backend.update_zone(&z).await.unwrap();

        assert_eq!(backend.find_serial("example.com.").await.unwrap(), Some(z.serial));
    }

    #[tokio::test]
    async fn record_lifecycle() {
        let backend = MemoryBackend::new("mem");
        let z = zone("example.com.");
        backend.create_zone(&z).await.unwrap();

        let record = Record::new(&z.id, "www.example.com.", "A", "192.0.2.10");
        backend.create_record(&z, &record).await.unwrap();
        assert_eq!(backend.records_of("example.com.").await.len(), 1);

        let mut updated = record.clone();
        updated.data = "192.0.2.11".to_string();
        backend.update_record(&z, &updated).await.unwrap();

        backend.delete_record(&z, &record).await.unwrap();
        backend.delete_record(&z, &record).await.unwrap();
        assert!(backend.records_of("example.com.").await.is_empty());
    }

    #[tokio::test]
    async fn record_in_unknown_zone_is_not_found() {
        let backend = MemoryBackend::new("mem");
        let z = zone("example.com.");
        let record = Record::new(&z.id, "www.example.com.", "A", "192.0.2.10");

        let result = backend.create_record(&z, &record).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn unreachable_backend_fails_every_verb() {
        let backend = MemoryBackend::new("mem");
        backend.set_unreachable(true);

        let z = zone("example.com.");
        assert!(matches!(
            backend.create_zone(&z).await,
            Err(Error::CommunicationFailure { .. })
        ));
        assert!(matches!(
            backend.find_serial("example.com.").await,
            Err(Error::CommunicationFailure { .. })
        ));
        assert!(!backend.ping().await.ok);

        backend.set_unreachable(false);
        assert!(backend.ping().await.ok);
    }

    #[tokio::test]
    async fn factory_uses_name_option() {
        let target = PoolTarget::new("t1", BACKEND_KIND).with_option("name", "ns-east");
        let adapter = MemoryBackendFactory.create(&target).unwrap();
        assert_eq!(adapter.backend_name(), "ns-east");
    }
}
