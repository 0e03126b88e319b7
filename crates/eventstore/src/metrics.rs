//! Event store metrics, labeled by event kind.

use ingest_core::EventKind;
use telemetry::{Counter, Histogram, MetricSet, TextEncoder};

const SEND_DURATION_BUCKETS_MS: &[u64] = &[100, 200, 300, 400, 500, 1_000, 5_000, 10_000, 60_000, 120_000];
const BATCH_SIZE_BUCKETS: &[u64] = &[1, 10, 100, 1_000, 10_000, 25_000, 50_000, 100_000];

#[derive(Debug)]
pub struct KindMetrics {
    /// Events successfully sent to the backend.
    pub events: Counter,
    pub batch_dropped: Counter,
    pub batch_retry: Counter,
    pub ring_buffer_dropped_events: Counter,
    pub send_batch_duration_ms: Histogram,
    /// Events per successfully sent batch.
    pub batch_size_events: Histogram,
}

impl KindMetrics {
    fn new() -> Self {
        Self {
            events: Counter::new(),
            batch_dropped: Counter::new(),
            batch_retry: Counter::new(),
            ring_buffer_dropped_events: Counter::new(),
            send_batch_duration_ms: Histogram::new(SEND_DURATION_BUCKETS_MS),
            batch_size_events: Histogram::new(BATCH_SIZE_BUCKETS),
        }
    }
}

#[derive(Debug)]
pub struct EventStoreMetrics {
    kinds: [KindMetrics; 4],
}

impl EventStoreMetrics {
    pub fn new() -> Self {
        Self {
            kinds: std::array::from_fn(|_| KindMetrics::new()),
        }
    }

    pub fn kind(&self, kind: EventKind) -> &KindMetrics {
        &self.kinds[kind.index()]
    }
}

impl Default for EventStoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSet for EventStoreMetrics {
    fn encode(&self, encoder: &mut TextEncoder) {
        let labeled = || EventKind::ALL.iter().map(move |kind| (kind.as_str(), self.kind(*kind)));

        for (kind, metrics) in labeled() {
            encoder.counter("eventstore_events_total", "Events sent to the backend.", &[("type", kind)], &metrics.events);
        }
        for (kind, metrics) in labeled() {
            encoder.counter("eventstore_batch_dropped_total", "Batches dropped after exhausting retries.", &[("type", kind)], &metrics.batch_dropped);
        }
        for (kind, metrics) in labeled() {
            encoder.counter("eventstore_batch_retry_total", "Batch insert retries.", &[("type", kind)], &metrics.batch_retry);
        }
        for (kind, metrics) in labeled() {
            encoder.counter(
                "eventstore_ring_buffers_dropped_events_total",
                "Events dropped because the ring buffer was full.",
                &[("type", kind)],
                &metrics.ring_buffer_dropped_events,
            );
        }
        for (kind, metrics) in labeled() {
            encoder.histogram(
                "eventstore_send_batch_duration_ms",
                "Time to send a batch, retries included, in milliseconds.",
                &[("type", kind)],
                &metrics.send_batch_duration_ms,
            );
        }
        for (kind, metrics) in labeled() {
            encoder.histogram(
                "eventstore_batch_size_events",
                "Events per sent batch.",
                &[("type", kind)],
                &metrics.batch_size_events,
            );
        }
    }
}
