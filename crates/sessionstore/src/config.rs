//! Session store configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Session store configuration, the `sessionstore` section of the service config.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionStoreConfig {
    /// Interval between garbage collection cycles.
    #[serde(default = "default_gc_interval_ms")]
    #[validate(range(min = 1))]
    pub gc_interval_ms: u64,
    /// Inactivity after which a session expires.
    #[serde(default = "default_session_inactive_ttl_secs")]
    #[validate(range(min = 1))]
    pub session_inactive_ttl_secs: u64,
    /// Position of the expiry used to decide whether a device is collected.
    /// 0 collects as soon as the earliest session expired, 100 waits for
    /// the latest one.
    #[serde(default = "default_device_expiry_percentile")]
    #[validate(range(max = 100))]
    pub device_expiry_percentile: u8,
    /// Maximum concurrent sessions per device.
    #[serde(default = "default_max_sessions_per_visitor")]
    #[validate(range(min = 1))]
    pub max_sessions_per_visitor: usize,
    /// Number of independently locked shards.
    #[serde(default = "default_shards")]
    #[validate(range(min = 1, max = 1024))]
    pub shards: usize,
}

fn default_gc_interval_ms() -> u64 {
    10_000
}

fn default_session_inactive_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_device_expiry_percentile() -> u8 {
    50
}

fn default_max_sessions_per_visitor() -> usize {
    64
}

fn default_shards() -> usize {
    16
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            gc_interval_ms: default_gc_interval_ms(),
            session_inactive_ttl_secs: default_session_inactive_ttl_secs(),
            device_expiry_percentile: default_device_expiry_percentile(),
            max_sessions_per_visitor: default_max_sessions_per_visitor(),
            shards: default_shards(),
        }
    }
}

impl SessionStoreConfig {
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }

    pub fn session_inactive_ttl(&self) -> Duration {
        Duration::from_secs(self.session_inactive_ttl_secs)
    }
}
