//! Application state shared across handlers.

use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter, SharedRateLimiter};
use eventstore::EventStore;
use ingest_core::SaltManager;
use serde::{Deserialize, Serialize};
use sessionstore::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use telemetry::{HealthRegistry, Registry};
use tracing::debug;
use validator::Validate;

/// Idle time after which a client's rate limit bucket is dropped.
const RATE_LIMIT_BUCKET_MAX_AGE: Duration = Duration::from_secs(300);

/// HTTP layer configuration, the `api` section of the service config.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiConfig {
    /// Budget of a request, bounds how long it waits for its session.
    #[serde(default = "default_request_timeout_ms")]
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,
    /// Requests per second and client address on event routes.
    #[serde(default = "default_rate_limit_per_sec")]
    pub rate_limit_per_sec: u32,
    #[serde(default = "default_rate_limit_burst")]
    #[validate(range(min = 1))]
    pub rate_limit_burst: u32,
}

fn default_request_timeout_ms() -> u64 {
    3_000
}

fn default_rate_limit_per_sec() -> u32 {
    50
}

fn default_rate_limit_burst() -> u32 {
    200
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            rate_limit_per_sec: default_rate_limit_per_sec(),
            rate_limit_burst: default_rate_limit_burst(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            rate: self.rate_limit_per_sec,
            burst: self.rate_limit_burst,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub events: Arc<EventStore>,
    pub salts: Arc<SaltManager>,
    pub rate_limiter: SharedRateLimiter,
    pub metrics: Arc<Registry>,
    pub health: Arc<HealthRegistry>,
    pub config: ApiConfig,
}

impl AppState {
    /// Builds the state and registers the stores' metrics.
    pub fn new(
        config: ApiConfig,
        sessions: Arc<SessionStore>,
        events: Arc<EventStore>,
        health: Arc<HealthRegistry>,
    ) -> Self {
        let metrics = Registry::new();
        metrics.register(sessions.metrics());
        metrics.register(events.metrics());

        Self {
            sessions,
            events,
            salts: Arc::new(SaltManager::new()),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit())),
            metrics: Arc::new(metrics),
            health,
            config,
        }
    }

    /// Start the rate limiter cleanup background task.
    pub fn start_rate_limiter_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let rate_limiter = self.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_BUCKET_MAX_AGE);
            loop {
                interval.tick().await;
                let removed = rate_limiter.cleanup(RATE_LIMIT_BUCKET_MAX_AGE);
                debug!(removed = removed, "Cleaned up rate limit buckets");
            }
        })
    }
}
