//! Error types for the zone convergence system
//!
//! Backend adapters translate backend-native failures into this closed
//! taxonomy so the engine can make masking and retry decisions without
//! knowing anything about the wire protocol behind an adapter.

use thiserror::Error;

/// Result type alias for convergence operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the zone convergence system
#[derive(Error, Debug)]
pub enum Error {
    /// The target has no record of the zone or object.
    ///
    /// Masked to success on delete paths; propagated otherwise.
    #[error("not found: {0}")]
    NotFound(String),

    /// The target already holds an equivalent or conflicting object.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Transient network/transport failure talking to a backend.
    ///
    /// Retried locally (bounded) by the adapter; once retries are
    /// exhausted this surfaces as a per-target failure, never as a
    /// fatal error for the whole convergence run.
    #[error("communication failure with backend {backend}: {message}")]
    CommunicationFailure {
        /// Backend name
        backend: String,
        /// Underlying failure description
        message: String,
    },

    /// Adapter or engine misconfiguration (bad credentials, missing
    /// required option). Fatal at construction time, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unrecognized backend-native error code.
    #[error("unknown backend error ({backend}): {message}")]
    UnknownBackend {
        /// Backend name
        backend: String,
        /// Original error description
        message: String,
    },

    /// Authoritative storage errors
    #[error("storage error: {0}")]
    Storage(String),

    /// Convergence tracker errors
    #[error("tracker error: {0}")]
    Tracker(String),

    /// Zone model invariant violation
    #[error("invalid zone {zone}: {message}")]
    InvalidZone {
        /// Zone name
        zone: String,
        /// Violated invariant
        message: String,
    },

    /// I/O errors (file tracker persistence)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a duplicate error
    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    /// Create a communication failure error
    pub fn communication(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommunicationFailure {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an unknown-backend error
    pub fn unknown_backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnknownBackend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a tracker error
    pub fn tracker(msg: impl Into<String>) -> Self {
        Self::Tracker(msg.into())
    }

    /// Create an invalid-zone error
    pub fn invalid_zone(zone: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidZone {
            zone: zone.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the object is absent on the target
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error means the object already exists on the target
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    /// Whether this error is worth retrying at the adapter level
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CommunicationFailure { .. } | Self::Io(_))
    }
}
