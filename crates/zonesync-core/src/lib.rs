// # zonesync-core
//
// Core library for the multi-backend DNS zone convergence controller.
//
// ## Architecture Overview
//
// - **BackendAdapter**: capability interface wrapping one concrete DNS
//   server or provider API
// - **CompositeBackend**: master/slave composition with ordered calls
//   and compensating rollback
// - **ConvergenceEngine**: drives a zone mutation to all pool targets
//   concurrently and computes the threshold-based terminal status
// - **ConvergenceTracker**: per-(target, zone, action) status cache,
//   volatile or durable
// - **RecoveryScanner / PeriodicResyncScanner**: periodic healing of
//   stuck zones and silent drift
// - **BackendRegistry**: startup-time mapping from backend-kind string
//   to adapter factory
//
// ## Design Principles
//
// 1. **Closed error taxonomy**: adapters translate backend-native
//    failures into a small set the engine can reason about
// 2. **Barrier fan-out**: targets converge independently; one slow
//    target never blocks the others beyond its own timeout budget
// 3. **Plugin-based**: backends are registered, never hardcoded
// 4. **Bounded suspension**: every network call carries an explicit
//    timeout; retries are bounded everywhere

pub mod composite;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod registry;
pub mod scanner;
pub mod storage;
pub mod tracker;
pub mod traits;

// Re-export core types for convenience
pub use composite::{CompositeBackend, CompositePingStatus};
pub use config::{ConvergenceConfig, TrackerConfig};
pub use engine::{ConvergenceEngine, EngineEvent, TargetState};
pub use error::{Error, Result};
pub use model::{Pool, PoolTarget, Record, Zone, ZoneAction, ZoneKind, ZoneStatus};
pub use registry::BackendRegistry;
pub use scanner::{PeriodicResyncScanner, RecoveryScanner};
pub use storage::MemoryStorage;
pub use tracker::{FileTracker, MemoryTracker, create_tracker};
pub use traits::{BackendAdapter, BackendFactory, ConvergenceTracker, PingStatus, Storage};
