//! Periodic storage scanners
//!
//! Both scanners re-enter the same engine pipeline as the normal
//! convergence path:
//!
//! - [`RecoveryScanner`]: heals zones stuck in PENDING
//! - [`PeriodicResyncScanner`]: forces full re-syncs to correct drift

pub mod recovery;
pub mod resync;

pub use recovery::RecoveryScanner;
pub use resync::PeriodicResyncScanner;
