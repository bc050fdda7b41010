//! Configuration types for the zone convergence system
//!
//! One explicit struct, passed into constructors. No global mutable
//! config object is read anywhere in the core.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Convergence engine and scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Minimum percentage of eligible targets that must confirm a change
    /// for the zone to be considered globally active (0..=100)
    #[serde(default = "default_threshold_percentage")]
    pub threshold_percentage: u32,

    /// Timeout budget for a single backend call or confirmation poll
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Delay between confirmation poll attempts
    #[serde(default = "default_poll_retry_interval_secs")]
    pub poll_retry_interval_secs: u64,

    /// Maximum confirmation poll attempts per target
    #[serde(default = "default_poll_max_retries")]
    pub poll_max_retries: u32,

    /// Initial delay before the first confirmation poll
    #[serde(default = "default_poll_delay_secs")]
    pub poll_delay_secs: u64,

    /// Whether the recovery scanner runs
    #[serde(default = "default_enabled_timer")]
    pub enable_recovery_timer: bool,

    /// Interval between recovery scans
    #[serde(default = "default_periodic_recovery_interval_secs")]
    pub periodic_recovery_interval_secs: u64,

    /// Whether the periodic resync scanner runs
    #[serde(default = "default_enabled_timer")]
    pub enable_sync_timer: bool,

    /// Interval between resync scans
    #[serde(default = "default_periodic_sync_interval_secs")]
    pub periodic_sync_interval_secs: u64,

    /// Trailing window of zone updates considered by a resync scan.
    /// `None` means unbounded: every zone is resynced each scan.
    #[serde(default = "default_periodic_sync_seconds")]
    pub periodic_sync_seconds: Option<u64>,

    /// Resync attempts per zone per scan before giving up until the
    /// next scheduled run
    #[serde(default = "default_periodic_sync_max_attempts")]
    pub periodic_sync_max_attempts: u32,

    /// Delay between resync attempts for the same zone
    #[serde(default = "default_periodic_sync_retry_interval_secs")]
    pub periodic_sync_retry_interval_secs: u64,

    /// Capacity of the engine event channel; events are dropped (with a
    /// warning log) when it is full
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ConvergenceConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.threshold_percentage > 100 {
            return Err(crate::Error::configuration(
                "threshold_percentage must be between 0 and 100",
            ));
        }
        if self.poll_timeout_secs == 0 {
            return Err(crate::Error::configuration("poll_timeout must be > 0"));
        }
        if self.periodic_recovery_interval_secs == 0 {
            return Err(crate::Error::configuration(
                "periodic_recovery_interval must be > 0",
            ));
        }
        if self.periodic_sync_interval_secs == 0 {
            return Err(crate::Error::configuration(
                "periodic_sync_interval must be > 0",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::configuration(
                "event_channel_capacity must be > 0",
            ));
        }
        Ok(())
    }

    /// Per-call timeout budget
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    /// Delay between confirmation polls
    pub fn poll_retry_interval(&self) -> Duration {
        Duration::from_secs(self.poll_retry_interval_secs)
    }

    /// Delay before the first confirmation poll
    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.poll_delay_secs)
    }

    /// Trailing resync window, if bounded
    pub fn sync_window(&self) -> Option<chrono::Duration> {
        self.periodic_sync_seconds
            .map(|secs| chrono::Duration::seconds(secs as i64))
    }
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            threshold_percentage: default_threshold_percentage(),
            poll_timeout_secs: default_poll_timeout_secs(),
            poll_retry_interval_secs: default_poll_retry_interval_secs(),
            poll_max_retries: default_poll_max_retries(),
            poll_delay_secs: default_poll_delay_secs(),
            enable_recovery_timer: default_enabled_timer(),
            periodic_recovery_interval_secs: default_periodic_recovery_interval_secs(),
            enable_sync_timer: default_enabled_timer(),
            periodic_sync_interval_secs: default_periodic_sync_interval_secs(),
            periodic_sync_seconds: default_periodic_sync_seconds(),
            periodic_sync_max_attempts: default_periodic_sync_max_attempts(),
            periodic_sync_retry_interval_secs: default_periodic_sync_retry_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Tracker persistence strategy
///
/// Both strategies are semantically equivalent; the volatile variant
/// tolerates a miss by returning "not found", which forces a re-poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerConfig {
    /// Volatile in-memory cache, entries vanish after the TTL
    #[default]
    Memory,

    /// Volatile in-memory cache with an expiration window
    MemoryWithTtl {
        /// Entry time-to-live in seconds
        ttl_secs: u64,
    },

    /// Durable JSON file store, survives process restart
    File {
        /// Path to the tracker state file
        path: String,
    },
}

fn default_threshold_percentage() -> u32 {
    100
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_poll_retry_interval_secs() -> u64 {
    15
}

fn default_poll_max_retries() -> u32 {
    10
}

fn default_poll_delay_secs() -> u64 {
    5
}

fn default_enabled_timer() -> bool {
    true
}

fn default_periodic_recovery_interval_secs() -> u64 {
    120
}

fn default_periodic_sync_interval_secs() -> u64 {
    1800
}

fn default_periodic_sync_seconds() -> Option<u64> {
    Some(21600)
}

fn default_periodic_sync_max_attempts() -> u32 {
    3
}

fn default_periodic_sync_retry_interval_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}
