//! Internal metrics collection.
//!
//! Services own their metric sets and register them with a [`Registry`],
//! which renders everything in the Prometheus text exposition format.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicI64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    pub fn set(&self, val: i64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Histogram with fixed upper bounds.
///
/// Bucket counts are stored non-cumulatively; values above the last bound
/// only show up in the `+Inf` bucket.
#[derive(Debug)]
pub struct Histogram {
    bounds: &'static [u64],
    buckets: Box<[AtomicU64]>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(bounds: &'static [u64]) -> Self {
        Self {
            bounds,
            buckets: bounds.iter().map(|_| AtomicU64::new(0)).collect(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        if let Some(i) = self.bounds.iter().position(|&bound| value <= bound) {
            self.buckets[i].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Cumulative `(upper bound, count)` pairs, excluding `+Inf`.
    pub fn cumulative_buckets(&self) -> Vec<(u64, u64)> {
        let mut running = 0;
        self.bounds
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| {
                running += count.load(Ordering::Relaxed);
                (bound, running)
            })
            .collect()
    }
}

/// Prometheus text format writer.
#[derive(Default)]
pub struct TextEncoder {
    out: String,
    described: HashSet<&'static str>,
}

impl TextEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn describe(&mut self, name: &'static str, help: &str, kind: &str) {
        if self.described.insert(name) {
            let _ = writeln!(self.out, "# HELP {} {}", name, help);
            let _ = writeln!(self.out, "# TYPE {} {}", name, kind);
        }
    }

    fn sample(&mut self, name: &str, suffix: &str, labels: &[(&str, &str)], value: impl std::fmt::Display) {
        self.out.push_str(name);
        self.out.push_str(suffix);
        if !labels.is_empty() {
            self.out.push('{');
            for (i, (key, val)) in labels.iter().enumerate() {
                if i > 0 {
                    self.out.push(',');
                }
                let _ = write!(self.out, "{}=\"{}\"", key, val.replace('"', "\\\""));
            }
            self.out.push('}');
        }
        let _ = writeln!(self.out, " {}", value);
    }

    pub fn counter(&mut self, name: &'static str, help: &str, labels: &[(&str, &str)], counter: &Counter) {
        self.describe(name, help, "counter");
        self.sample(name, "", labels, counter.get());
    }

    pub fn gauge(&mut self, name: &'static str, help: &str, labels: &[(&str, &str)], gauge: &Gauge) {
        self.describe(name, help, "gauge");
        self.sample(name, "", labels, gauge.get());
    }

    pub fn histogram(
        &mut self,
        name: &'static str,
        help: &str,
        labels: &[(&str, &str)],
        histogram: &Histogram,
    ) {
        self.describe(name, help, "histogram");

        for (bound, count) in histogram.cumulative_buckets() {
            let le = bound.to_string();
            let mut bucket_labels = labels.to_vec();
            bucket_labels.push(("le", &le));
            self.sample(name, "_bucket", &bucket_labels, count);
        }

        let mut inf_labels = labels.to_vec();
        inf_labels.push(("le", "+Inf"));
        self.sample(name, "_bucket", &inf_labels, histogram.count());
        self.sample(name, "_sum", labels, histogram.sum());
        self.sample(name, "_count", labels, histogram.count());
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// A group of metrics owned by one service.
pub trait MetricSet: Send + Sync {
    fn encode(&self, encoder: &mut TextEncoder);
}

/// Collection of registered metric sets.
#[derive(Default)]
pub struct Registry {
    sets: RwLock<Vec<Arc<dyn MetricSet>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, set: Arc<dyn MetricSet>) {
        self.sets.write().push(set);
    }

    /// Renders all registered sets.
    pub fn render(&self) -> String {
        let mut encoder = TextEncoder::new();
        for set in self.sets.read().iter() {
            set.encode(&mut encoder);
        }
        encoder.finish()
    }
}
