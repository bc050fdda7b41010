// # Backend Adapter Trait
//
// Defines the capability interface wrapping one concrete DNS server or
// provider API (BIND via RNDC, PowerDNS, vendor REST/SOAP, ...).
//
// ## Implementations
//
// - Memory: `zonesync-backend-memory` crate (reference adapter)
// - Composite master/slave: [`crate::composite::CompositeBackend`]
//
// Wire-level details live entirely inside each adapter; the engine only
// sees the three idempotent zone verbs, the record verbs, ping, and the
// optional serial observation hook.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{PoolTarget, Record, Zone};

/// Advisory health-check result
///
/// Ping never raises; failures are captured as a boolean plus reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingStatus {
    /// Whether the backend responded
    pub ok: bool,
    /// Failure description when `ok` is false
    pub reason: Option<String>,
}

impl PingStatus {
    /// Healthy backend
    pub fn up() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    /// Unhealthy backend with a reason
    pub fn down(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// Trait for DNS backend adapter implementations
///
/// Adapters translate the idempotent verbs into backend-native calls and
/// translate backend-native errors into the closed taxonomy in
/// [`crate::error::Error`].
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Idempotency contract
///
/// - `delete_zone` on a zone the backend has no record of returns `Ok`;
///   not-found on delete is masked inside the adapter.
/// - `create_zone` on an equivalent existing zone returns `Ok`;
///   a conflicting existing zone surfaces [`Error::Duplicate`]. What
///   counts as "equivalent" is adapter policy and must be documented
///   per adapter.
///
/// # Retry policy
///
/// Transient transport failures are retried locally and bounded (see
/// [`with_retries`]); exhausting retries surfaces
/// [`Error::CommunicationFailure`]. The engine never retries a verb
/// itself; it records the per-target failure and moves on.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Create the zone on the backend
    async fn create_zone(&self, zone: &Zone) -> Result<()>;

    /// Bring the backend's copy of the zone up to the current serial
    ///
    /// The default implementation is the canonical fallback for
    /// backends without a native update primitive: a full re-sync as
    /// delete followed by create. Adapters with a cheaper native path
    /// override this.
    async fn update_zone(&self, zone: &Zone) -> Result<()> {
        match self.delete_zone(zone).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        self.create_zone(zone).await
    }

    /// Remove the zone from the backend
    ///
    /// Deleting an already-absent zone must return `Ok`.
    async fn delete_zone(&self, zone: &Zone) -> Result<()>;

    /// Create a record inside the zone
    async fn create_record(&self, zone: &Zone, record: &Record) -> Result<()>;

    /// Update a record inside the zone
    async fn update_record(&self, zone: &Zone, record: &Record) -> Result<()>;

    /// Delete a record inside the zone
    async fn delete_record(&self, zone: &Zone, record: &Record) -> Result<()>;

    /// Advisory health check; must not raise
    async fn ping(&self) -> PingStatus;

    /// Whether the adapter can observe a zone's served SOA serial
    ///
    /// When false, the engine trusts the synchronous verb outcome
    /// instead of polling for confirmation.
    fn supports_serial_polling(&self) -> bool {
        false
    }

    /// Observe the SOA serial the backend currently serves for a zone
    ///
    /// Returns `Ok(Some(serial))` when the zone is present,
    /// `Ok(None)` when the backend has no record of it.
    async fn find_serial(&self, _zone_name: &str) -> Result<Option<u32>> {
        Ok(None)
    }

    /// Adapter name for logging
    fn backend_name(&self) -> &str;
}

/// Helper trait for constructing backend adapters from pool targets
pub trait BackendFactory: Send + Sync {
    /// Create an adapter instance from a pool target configuration
    ///
    /// Misconfiguration (missing required option, bad credentials)
    /// surfaces [`Error::Configuration`] here, at construction time.
    fn create(&self, target: &PoolTarget) -> Result<Arc<dyn BackendAdapter>>;
}

/// Run an adapter operation with bounded retries for transient failures
///
/// Non-transient errors return immediately. Exhausting `max_attempts`
/// surfaces the last transient error as a communication failure.
pub async fn with_retries<T, F, Fut>(
    backend: &str,
    max_attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_message = String::from("no attempts made");
    for attempt in 1..=max_attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                warn!(
                    backend,
                    attempt,
                    max_attempts,
                    error = %e,
                    "transient backend failure"
                );
                last_message = e.to_string();
                if attempt < max_attempts {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::communication(backend, last_message))
}
