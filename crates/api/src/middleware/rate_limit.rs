//! Per-client rate limiting.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::extractors::ClientIp;
use crate::response::ApiError;
use crate::state::AppState;

/// Key used for requests whose client address is unknown.
const UNKNOWN_CLIENT: &str = "unknown";

/// Token bucket rate limiter keyed by client address.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    config: RateLimitConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Tokens refilled per second
    pub rate: u32,
    /// Bucket capacity
    pub burst: u32,
}

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(burst: u32, now: Instant) -> Self {
        Self {
            tokens: burst as f64,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, now: Instant, rate: u32, burst: u32) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        self.tokens = (self.tokens + elapsed * rate as f64).min(burst as f64);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Check if request is allowed for the given key.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.config.burst, now));

        bucket.try_acquire(now, self.config.rate, self.config.burst)
    }

    /// Drops buckets idle for at least `max_age`.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        self.cleanup_at(max_age, Instant::now())
    }

    fn cleanup_at(&self, max_age: Duration, now: Instant) -> usize {
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < max_age);
        before - buckets.len()
    }

    /// Seconds until a drained bucket holds a token again.
    pub fn retry_after_secs(&self) -> u64 {
        if self.config.rate == 0 {
            return 1;
        }
        (1.0 / self.config.rate as f64).ceil().max(1.0) as u64
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Shared rate limiter state.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Rejects requests from clients that exhausted their bucket.
pub async fn rate_limit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    request: Request,
    next: Next,
) -> Response {
    let key = ip.as_deref().unwrap_or(UNKNOWN_CLIENT);

    if !state.rate_limiter.check(key) {
        debug!(client_ip = key, path = %request.uri().path(), "Rate limited request");
        return ApiError::rate_limited("Too many requests", Some(state.rate_limiter.retry_after_secs()))
            .into_response();
    }

    next.run(request).await
}
