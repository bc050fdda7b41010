//! Data model for zones, pools, and pool targets
//!
//! The authoritative copy of every zone lives in central storage; the
//! convergence engine only ever mutates the `status` field. Pools and
//! their targets are read-only inputs configured out of band.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Pending mutation recorded against a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ZoneAction {
    /// Zone must be created on every target
    Create,
    /// Zone data changed; targets must pick up the new serial
    Update,
    /// Zone must be removed from every target
    Delete,
    /// No mutation outstanding
    None,
}

impl fmt::Display for ZoneAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ZoneAction::Create => "CREATE",
            ZoneAction::Update => "UPDATE",
            ZoneAction::Delete => "DELETE",
            ZoneAction::None => "NONE",
        };
        f.write_str(s)
    }
}

/// Globally visible convergence state of a zone
///
/// This tri-state (plus the deleted terminal) is the only failure signal
/// exposed upward; detailed per-target errors stay in operator logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ZoneStatus {
    /// Convergence in progress
    Pending,
    /// Threshold met; targets serve the current serial
    Active,
    /// Threshold not met after exhausting retries
    Error,
    /// Zone removed from enough targets
    Deleted,
}

impl ZoneStatus {
    /// Whether this status is terminal (no convergence run outstanding)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ZoneStatus::Pending)
    }
}

impl fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ZoneStatus::Pending => "PENDING",
            ZoneStatus::Active => "ACTIVE",
            ZoneStatus::Error => "ERROR",
            ZoneStatus::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// Primary/secondary nature of a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZoneKind {
    /// Authoritative primary zone
    Primary {
        /// SOA contact email, required for primaries
        email: String,
    },
    /// Secondary zone transferred from upstream masters
    Secondary {
        /// Upstream master addresses, at least one required
        masters: Vec<String>,
    },
}

/// Authoritative DNS zone record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Unique zone id
    pub id: String,
    /// FQDN with trailing dot (e.g. "example.com.")
    pub name: String,
    /// Primary/secondary kind plus kind-specific attributes
    pub kind: ZoneKind,
    /// Monotonic SOA serial
    pub serial: u32,
    /// Outstanding mutation
    pub action: ZoneAction,
    /// Convergence status
    pub status: ZoneStatus,
    /// Pool that serves this zone, assigned by the scheduler upstream
    pub pool_id: String,
    /// Optional TTL override (primaries only)
    pub ttl: Option<u32>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Zone {
    /// Create a new pending zone with action CREATE
    pub fn new(name: impl Into<String>, kind: ZoneKind, pool_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            serial: 1,
            action: ZoneAction::Create,
            status: ZoneStatus::Pending,
            pool_id: pool_id.into(),
            ttl: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the zone model invariants
    ///
    /// Primary zones carry a non-empty email and no masters; secondary
    /// zones carry at least one master, no email, and no TTL override.
    pub fn validate(&self) -> Result<()> {
        if !self.name.ends_with('.') {
            return Err(Error::invalid_zone(
                &self.name,
                "zone name must be a FQDN with a trailing dot",
            ));
        }

        match &self.kind {
            ZoneKind::Primary { email } => {
                if email.is_empty() {
                    return Err(Error::invalid_zone(
                        &self.name,
                        "primary zones require a contact email",
                    ));
                }
            }
            ZoneKind::Secondary { masters } => {
                if masters.is_empty() {
                    return Err(Error::invalid_zone(
                        &self.name,
                        "secondary zones require at least one master",
                    ));
                }
                if self.ttl.is_some() {
                    return Err(Error::invalid_zone(
                        &self.name,
                        "secondary zones cannot override TTL",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Mark a new pending mutation, bumping the serial and timestamp
    pub fn mutate(&mut self, action: ZoneAction) {
        self.action = action;
        self.status = ZoneStatus::Pending;
        self.serial = self.serial.wrapping_add(1);
        self.updated_at = Utc::now();
    }

    /// Whether the zone was updated within the trailing window
    pub fn updated_within(&self, window: chrono::Duration) -> bool {
        Utc::now().signed_duration_since(self.updated_at) <= window
    }
}

/// One resource record inside a zone
///
/// Needed by the composite backend for slave-recreate compensation and
/// by the resync path for full zone rebuilds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique record id
    pub id: String,
    /// Owning zone id
    pub zone_id: String,
    /// Record owner name
    pub name: String,
    /// Record type ("A", "AAAA", "MX", ...)
    pub rtype: String,
    /// Record data in presentation format
    pub data: String,
    /// Optional TTL
    pub ttl: Option<u32>,
}

impl Record {
    /// Create a new record for a zone
    pub fn new(
        zone_id: impl Into<String>,
        name: impl Into<String>,
        rtype: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            zone_id: zone_id.into(),
            name: name.into(),
            rtype: rtype.into(),
            data: data.into(),
            ttl: None,
        }
    }
}

/// A named group of targets that together serve a set of zones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    /// Unique pool id
    pub id: String,
    /// Human-readable pool name
    pub name: String,
    /// Nameserver hostnames advertised for this pool
    pub nameservers: Vec<String>,
    /// Backend targets the pool fans out to
    pub targets: Vec<PoolTarget>,
}

/// One backend adapter configuration inside a pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolTarget {
    /// Unique target id
    pub id: String,
    /// Backend type looked up in the registry ("memory", "multi", ...)
    pub backend_kind: String,
    /// Master addresses advertised to this target
    pub masters: Vec<String>,
    /// Opaque adapter options (credentials, hostnames, timeouts)
    #[serde(default)]
    pub options: HashMap<String, String>,
    /// Administrative enable flag
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl PoolTarget {
    /// Create a new enabled target
    pub fn new(id: impl Into<String>, backend_kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            backend_kind: backend_kind.into(),
            masters: vec!["192.0.2.1:53".to_string()],
            options: HashMap::new(),
            enabled: true,
        }
    }

    /// Set the advertised master addresses
    pub fn with_masters(mut self, masters: Vec<String>) -> Self {
        self.masters = masters;
        self
    }

    /// Set an adapter option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Enable or disable the target administratively
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether this target counts toward the convergence denominator
    ///
    /// Disabled targets and targets with no configured addresses are
    /// excluded from the threshold computation. They still show up in
    /// engine events so operators can see them.
    pub fn is_eligible(&self) -> bool {
        self.enabled && !self.masters.is_empty()
    }
}

fn default_enabled() -> bool {
    true
}
