//! Core traits for the zone convergence system
//!
//! This module defines the abstract interfaces the engine is built on.
//!
//! - [`BackendAdapter`]: drive one concrete DNS server/provider
//! - [`Storage`]: read zones/records, write zone status
//! - [`ConvergenceTracker`]: per-(target, zone, action) status cache

pub mod backend;
pub mod storage;
pub mod tracker;

pub use backend::{BackendAdapter, BackendFactory, PingStatus, with_retries};
pub use storage::{Storage, ZoneCriteria};
pub use tracker::{ConvergenceOutcome, ConvergenceStatus, ConvergenceTracker, status_key};
