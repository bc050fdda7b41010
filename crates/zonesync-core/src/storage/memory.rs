// # Memory Storage
//
// In-memory implementation of the Storage trait. The production
// datastore lives behind the API layer; this implementation backs the
// daemon's standalone mode and the test suites.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::{Record, Zone, ZoneAction, ZoneStatus};
use crate::traits::storage::{Storage, ZoneCriteria};

/// In-memory authoritative zone store
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    zones: Arc<RwLock<HashMap<String, Zone>>>,
    records: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a zone
    pub async fn insert_zone(&self, zone: Zone) {
        let mut guard = self.zones.write().await;
        guard.insert(zone.id.clone(), zone);
    }

    /// Append a record to a zone
    pub async fn insert_record(&self, record: Record) {
        let mut guard = self.records.write().await;
        guard.entry(record.zone_id.clone()).or_default().push(record);
    }

    /// Number of stored zones
    pub async fn zone_count(&self) -> usize {
        self.zones.read().await.len()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_zone(&self, zone_id: &str) -> Result<Zone> {
        let guard = self.zones.read().await;
        guard
            .get(zone_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("zone {zone_id}")))
    }

    async fn find_zones(&self, criteria: &ZoneCriteria) -> Result<Vec<Zone>> {
        let guard = self.zones.read().await;
        Ok(guard
            .values()
            .filter(|zone| criteria.matches(zone))
            .cloned()
            .collect())
    }

    async fn update_zone_status(
        &self,
        zone_id: &str,
        status: ZoneStatus,
        serial: u32,
        action: ZoneAction,
    ) -> Result<()> {
        let mut guard = self.zones.write().await;
        let zone = guard
            .get_mut(zone_id)
            .ok_or_else(|| Error::not_found(format!("zone {zone_id}")))?;
        zone.status = status;
        zone.serial = serial;
        zone.action = action;
        zone.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn find_records(&self, zone_id: &str) -> Result<Vec<Record>> {
        let guard = self.records.read().await;
        Ok(guard.get(zone_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ZoneKind;

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
    async fn get_unknown_zone_is_not_found() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.get_zone("missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn find_zones_filters_by_status() {
        let storage = MemoryStorage::new();
        let mut active = zone("active.example.com.");
        active.status = ZoneStatus::Active;
        let pending = zone("pending.example.com.");

        storage.insert_zone(active).await;
        storage.insert_zone(pending.clone()).await;

        let criteria = ZoneCriteria::default().with_status(ZoneStatus::Pending);
        let found = storage.find_zones(&criteria).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, pending.id);
    }

    #[tokio::test]
    async fn update_zone_status_persists_all_fields() {
        let storage = MemoryStorage::new();
        let z = zone("example.com.");
        let id = z.id.clone();
        storage.insert_zone(z).await;

        storage
            .update_zone_status(&id, ZoneStatus::Active, 9, ZoneAction::None)
            .await
            .unwrap();

        let updated = storage.get_zone(&id).await.unwrap();
        assert_eq!(updated.status, ZoneStatus::Active);
        assert_eq!(updated.serial, 9);
        assert_eq!(updated.action, ZoneAction::None);
    }

    #[tokio::test]
    async fn find_records_returns_zone_records() {
        let storage = MemoryStorage::new();
        let z = zone("example.com.");
        let id = z.id.clone();
        storage.insert_zone(z).await;
        storage
            .insert_record(Record::new(&id, "www.example.com.", "A", "192.0.2.10"))
            .await;

        let records = storage.find_records(&id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rtype, "A");
    }
}
