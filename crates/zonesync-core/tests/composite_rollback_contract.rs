//! Architectural Contract Test: Composite Ordering & Rollback
//!
//! This test pins the composite backend's strict operation order and
//! its single-attempt compensating rollback.
//!
//! Constraints verified:
//! - create: master first, slave failure rolls the master back once
//! - delete: slave first, master failure restores the slave from the
//!   pre-delete snapshot, records included
//! - the original error is re-raised after a successful compensation;
//!   a failing compensation propagates instead
//! - update and record verbs never touch the slave
//!
//! If this test fails, a master/slave pair can end up permanently
//! half-provisioned.

mod common;

use common::*;
use std::sync::Arc;
use zonesync_core::error::Error;
use zonesync_core::traits::BackendAdapter;
use zonesync_core::{CompositeBackend, Record};

#[tokio::test]
async fn slave_create_failure_rolls_back_master_exactly_once() {
    let zone = primary_zone("example.com.");
    let storage = seeded_storage(&[zone.clone()]).await;

    let master = MockBackend::new("master");
    let slave = MockBackend::new("slave");
    slave.set_create_zone_outcome(VerbOutcome::CommFailure);

    let composite = CompositeBackend::new(
        Arc::new(master.handle()),
        Arc::new(slave.handle()),
        as_storage(&storage),
    );

    let result = composite.create_zone(&zone).await;

    // The slave's original error is what the caller sees.
    assert!(matches!(result, Err(Error::CommunicationFailure { .. })));
    assert_eq!(master.create_zone_calls(), 1);
    assert_eq!(master.delete_zone_calls(), 1, "exactly one compensation");
    assert_eq!(slave.create_zone_calls(), 1);
}

#[tokio::test]
async fn master_create_failure_needs_no_compensation() {
    let zone = primary_zone("example.com.");
    let storage = seeded_storage(&[zone.clone()]).await;

    let master = MockBackend::new("master");
    let slave = MockBackend::new("slave");
    master.set_create_zone_outcome(VerbOutcome::Duplicate);

    let composite = CompositeBackend::new(
        Arc::new(master.handle()),
        Arc::new(slave.handle()),
        as_storage(&storage),
    );

    let result = composite.create_zone(&zone).await;

    assert!(matches!(result, Err(Error::Duplicate(_))));
    assert_eq!(slave.create_zone_calls(), 0, "slave never attempted");
    assert_eq!(master.delete_zone_calls(), 0);
}

#[tokio::test]
async fn master_delete_failure_restores_slave_from_snapshot() {
    let zone = primary_zone("example.com.");
    let storage = seeded_storage(&[zone.clone()]).await;
    storage
        .insert_record(Record::new(&zone.id, "www.example.com.", "A", "192.0.2.10"))
        .await;
    storage
        .insert_record(Record::new(&zone.id, "mail.example.com.", "A", "192.0.2.11"))
        .await;

    let master = MockBackend::new("master");
    let slave = MockBackend::new("slave");
    master.set_delete_zone_outcome(VerbOutcome::CommFailure);

    let composite = CompositeBackend::new(
        Arc::new(master.handle()),
        Arc::new(slave.handle()),
        as_storage(&storage),
    );

    let result = composite.delete_zone(&zone).await;

    assert!(matches!(result, Err(Error::CommunicationFailure { .. })));

    // Slave was deleted first, then restored: zone plus both records.
    assert_eq!(slave.delete_zone_calls(), 1);
    assert_eq!(slave.create_zone_calls(), 1);
    assert_eq!(slave.create_record_calls(), 2);

    let restored = slave.created_records();
    assert!(restored.contains(&"www.example.com.".to_string()));
    assert!(restored.contains(&"mail.example.com.".to_string()));
}

#[tokio::test]
async fn failed_compensation_propagates_to_the_caller() {
    let zone = primary_zone("example.com.");
    let storage = seeded_storage(&[zone.clone()]).await;

    let master = MockBackend::new("master");
    let slave = MockBackend::new("slave");
    // Slave rejects the create; the master rollback then fails too.
    slave.set_create_zone_outcome(VerbOutcome::Duplicate);
    master.set_delete_zone_outcome(VerbOutcome::CommFailure);

    let composite = CompositeBackend::new(
        Arc::new(master.handle()),
        Arc::new(slave.handle()),
        as_storage(&storage),
    );

    let result = composite.create_zone(&zone).await;

    // The compensation failure surfaces, not the slave's duplicate.
    assert!(matches!(result, Err(Error::CommunicationFailure { .. })));
    assert_eq!(master.delete_zone_calls(), 1);
}

#[tokio::test]
async fn update_and_record_verbs_are_master_only() {
    let zone = primary_zone("example.com.");
    let storage = seeded_storage(&[zone.clone()]).await;

    let master = MockBackend::new("master");
    let slave = MockBackend::new("slave");

    let composite = CompositeBackend::new(
        Arc::new(master.handle()),
        Arc::new(slave.handle()),
        as_storage(&storage),
    );

    composite.update_zone(&zone).await.unwrap();

    let record = Record::new(&zone.id, "www.example.com.", "A", "192.0.2.10");
    composite.create_record(&zone, &record).await.unwrap();
    composite.update_record(&zone, &record).await.unwrap();
    composite.delete_record(&zone, &record).await.unwrap();

    assert_eq!(master.create_record_calls(), 1);
    assert_eq!(master.update_record_calls(), 1);
    assert_eq!(master.delete_record_calls(), 1);

    // The slave converges via zone transfer; no direct calls.
    assert_eq!(slave.create_zone_calls(), 0);
    assert_eq!(slave.delete_zone_calls(), 0);
    assert_eq!(slave.create_record_calls(), 0);
    assert_eq!(slave.update_record_calls(), 0);
    assert_eq!(slave.delete_record_calls(), 0);
}

#[tokio::test]
async fn ping_reports_each_side_independently() {
    let zone = primary_zone("example.com.");
    let storage = seeded_storage(&[zone]).await;

    let master = MockBackend::new("master");
    let slave = MockBackend::new("slave");
    master.set_unreachable(true);

    let composite = CompositeBackend::new(
        Arc::new(master.handle()),
        Arc::new(slave.handle()),
        as_storage(&storage),
    );

    let parts = composite.ping_parts().await;
    assert!(!parts.master.ok);
    assert!(parts.slave.ok);

    let combined = composite.ping().await;
    assert!(!combined.ok);
    assert!(combined.reason.unwrap().contains("master:"));
}
