//! Event store configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Storage backend driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Networked ClickHouse server.
    Clickhouse,
    /// In-process tables, lost on restart.
    Memory,
}

/// Event store configuration, the `eventstore` section of the service config.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EventStoreConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// Rows per batch that trigger a flush.
    #[serde(default = "default_max_batch_size")]
    #[validate(range(min = 1))]
    pub max_batch_size: usize,
    /// Age of the first row of a batch that triggers a flush.
    #[serde(default = "default_max_batch_timeout_ms")]
    #[validate(range(min = 1))]
    pub max_batch_timeout_ms: u64,
    /// Ring buffer capacity, as a multiple of `max_batch_size`.
    #[serde(default = "default_ring_buffers_factor")]
    #[validate(range(min = 1))]
    pub ring_buffers_factor: usize,
    /// Insert attempts per batch before it is dropped.
    #[serde(default = "default_max_send_attempts")]
    #[validate(range(min = 1))]
    pub max_send_attempts: u32,
    /// Linear backoff step between attempts.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_backend() -> BackendKind {
    BackendKind::Clickhouse
}

fn default_max_batch_size() -> usize {
    4096
}

fn default_max_batch_timeout_ms() -> u64 {
    60_000
}

fn default_ring_buffers_factor() -> usize {
    100
}

fn default_max_send_attempts() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            max_batch_size: default_max_batch_size(),
            max_batch_timeout_ms: default_max_batch_timeout_ms(),
            ring_buffers_factor: default_ring_buffers_factor(),
            max_send_attempts: default_max_send_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl EventStoreConfig {
    pub fn max_batch_timeout(&self) -> Duration {
        Duration::from_millis(self.max_batch_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn ring_buffer_capacity(&self) -> usize {
        self.max_batch_size.saturating_mul(self.ring_buffers_factor).max(1)
    }
}
