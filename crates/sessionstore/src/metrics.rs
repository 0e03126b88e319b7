//! Session store metrics.

use telemetry::{Counter, Gauge, Histogram, MetricSet, TextEncoder};

const PAGEVIEW_BUCKETS: &[u64] = &[1, 2, 3, 5, 10, 15, 25, 30, 50, 100];
const GC_DURATION_BUCKETS_MS: &[u64] = &[1, 2, 3, 5, 10, 15, 25, 30, 50, 100];

#[derive(Debug)]
pub struct SessionStoreMetrics {
    pub sessions_inserted: Counter,
    pub sessions_expired: Counter,
    pub devices_inserted: Counter,
    pub devices_deleted: Counter,
    /// Callers currently suspended in `wait_session`.
    pub sessions_wait: Gauge,
    /// Pageview count of sessions at expiry.
    pub sessions_pageviews: Histogram,
    pub gc_cycles: Counter,
    pub gc_cycles_duration_ms: Histogram,
}

impl SessionStoreMetrics {
    pub fn new() -> Self {
        Self {
            sessions_inserted: Counter::new(),
            sessions_expired: Counter::new(),
            devices_inserted: Counter::new(),
            devices_deleted: Counter::new(),
            sessions_wait: Gauge::new(),
            sessions_pageviews: Histogram::new(PAGEVIEW_BUCKETS),
            gc_cycles: Counter::new(),
            gc_cycles_duration_ms: Histogram::new(GC_DURATION_BUCKETS_MS),
        }
    }
}

impl Default for SessionStoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSet for SessionStoreMetrics {
    fn encode(&self, encoder: &mut TextEncoder) {
        const SESSIONS: &str = "sessionstore_sessions_total";
        const DEVICES: &str = "sessionstore_devices_total";

        encoder.counter(SESSIONS, "Sessions by lifecycle event.", &[("type", "inserted")], &self.sessions_inserted);
        encoder.counter(SESSIONS, "Sessions by lifecycle event.", &[("type", "expired")], &self.sessions_expired);
        encoder.counter(DEVICES, "Devices by lifecycle event.", &[("type", "inserted")], &self.devices_inserted);
        encoder.counter(DEVICES, "Devices by lifecycle event.", &[("type", "deleted")], &self.devices_deleted);
        encoder.gauge(
            "sessionstore_sessions_wait",
            "Requests waiting for a session.",
            &[],
            &self.sessions_wait,
        );
        encoder.histogram(
            "sessionstore_sessions_pageviews",
            "Pageviews per expired session.",
            &[],
            &self.sessions_pageviews,
        );
        encoder.counter(
            "sessionstore_gc_cycles_total",
            "Garbage collection cycles.",
            &[],
            &self.gc_cycles,
        );
        encoder.histogram(
            "sessionstore_gc_cycles_duration_ms",
            "Garbage collection cycle duration in milliseconds.",
            &[],
            &self.gc_cycles_duration_ms,
        );
    }
}
