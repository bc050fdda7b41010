//! Composite master/slave backend
//!
//! Composes two adapters and enforces a strict operation order with a
//! single-attempt compensating rollback:
//!
//! - create: master first, then slave; a slave failure compensates by
//!   deleting the zone from the master again
//! - delete: slave first, then master; a master failure compensates by
//!   recreating the zone (and its stored records) on the slave
//! - update and all record verbs: master only; slaves converge through
//!   their own transfer mechanism
//!
//! The two ordered calls are never parallelized: the rollback strategy
//! assumes the first step succeeded before the second is attempted. A
//! failure of the compensating step itself propagates to the caller,
//! leaving an operator-visible partially-compensated state instead of
//! an endlessly retried rollback chain.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{Record, Zone};
use crate::traits::backend::{BackendAdapter, PingStatus};
use crate::traits::storage::Storage;

/// Per-side ping result of a composite backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositePingStatus {
    /// Master adapter health
    pub master: PingStatus,
    /// Slave adapter health
    pub slave: PingStatus,
}

/// Master/slave composite backend adapter
pub struct CompositeBackend {
    master: Arc<dyn BackendAdapter>,
    slave: Arc<dyn BackendAdapter>,
    storage: Arc<dyn Storage>,
    name: String,
}

impl CompositeBackend {
    /// Compose a master and a slave adapter
    ///
    /// The storage handle is needed to snapshot a zone and its records
    /// before a delete, so the slave can be restored on rollback.
    pub fn new(
        master: Arc<dyn BackendAdapter>,
        slave: Arc<dyn BackendAdapter>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let name = format!(
            "multi({}+{})",
            master.backend_name(),
            slave.backend_name()
        );
        Self {
            master,
            slave,
            storage,
            name,
        }
    }

    /// Ping both sides and report them separately
    ///
    /// One failing side never fails the call as a whole.
    pub async fn ping_parts(&self) -> CompositePingStatus {
        CompositePingStatus {
            master: self.master.ping().await,
            slave: self.slave.ping().await,
        }
    }
}

#[async_trait]
impl BackendAdapter for CompositeBackend {
    async fn create_zone(&self, zone: &Zone) -> Result<()> {
        // Master first; if it fails there is nothing to compensate.
        self.master.create_zone(zone).await?;

        if let Err(slave_err) = self.slave.create_zone(zone).await {
            warn!(
                zone = %zone.name,
                error = %slave_err,
                "slave create failed, rolling back master"
            );
            // Compensation failures propagate instead of the original.
            self.master.delete_zone(zone).await?;
            return Err(slave_err);
        }

        Ok(())
    }

    async fn update_zone(&self, zone: &Zone) -> Result<()> {
        // Slaves pick up updates through zone transfer, not this path.
        self.master.update_zone(zone).await
    }

    async fn delete_zone(&self, zone: &Zone) -> Result<()> {
        // Snapshot before the slave delete; a later rollback must
        // restore what the zone looked like at this point.
        let snapshot = self.storage.get_zone(&zone.id).await?;
        let records = self.storage.find_records(&zone.id).await?;

        self.slave.delete_zone(zone).await?;

        if let Err(master_err) = self.master.delete_zone(zone).await {
            warn!(
                zone = %zone.name,
                error = %master_err,
                "master delete failed, restoring slave"
            );
            self.slave.create_zone(&snapshot).await?;
            for record in &records {
                self.slave.create_record(&snapshot, record).await?;
            }
            return Err(master_err);
        }

        debug!(zone = %zone.name, "composite delete complete");
        Ok(())
    }

    async fn create_record(&self, zone: &Zone, record: &Record) -> Result<()> {
        self.master.create_record(zone, record).await
    }

    async fn update_record(&self, zone: &Zone, record: &Record) -> Result<()> {
        self.master.update_record(zone, record).await
    }

    async fn delete_record(&self, zone: &Zone, record: &Record) -> Result<()> {
        self.master.delete_record(zone, record).await
    }

    async fn ping(&self) -> PingStatus {
        let parts = self.ping_parts().await;
        if parts.master.ok && parts.slave.ok {
            PingStatus::up()
        } else {
            let mut reasons = Vec::new();
            if let Some(reason) = parts.master.reason {
                reasons.push(format!("master: {reason}"));
            }
            if let Some(reason) = parts.slave.reason {
                reasons.push(format!("slave: {reason}"));
            }
            PingStatus::down(reasons.join("; "))
        }
    }

    fn supports_serial_polling(&self) -> bool {
        self.master.supports_serial_polling()
    }

    async fn find_serial(&self, zone_name: &str) -> Result<Option<u32>> {
        self.master.find_serial(zone_name).await
    }

    fn backend_name(&self) -> &str {
        &self.name
    }
}
