//! Event store service.
//!
//! Each event kind has a ring buffer drained by its own batch loop. A loop
//! flushes when the batch holds `max_batch_size` rows, when its first row
//! is `max_batch_timeout` old, and once more on shutdown.

use ingest_core::{
    CustomEvent, Error, FileDownload, OutboundLinkClick, PageView, Result,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::backend::{ensure_read_only, Backend, QueryRow};
use crate::batch::Batch;
use crate::config::EventStoreConfig;
use crate::metrics::EventStoreMetrics;
use crate::ring::{ring_buffer, RingConsumer, RingProducer};
use crate::rows::{EmitRows, RowBatch};

pub struct EventStore {
    pageviews: RingProducer<PageView>,
    custom_events: RingProducer<CustomEvent>,
    outbound_link_clicks: RingProducer<OutboundLinkClick>,
    file_downloads: RingProducer<FileDownload>,
    backend: Arc<dyn Backend>,
    metrics: Arc<EventStoreMetrics>,
    shutdown: watch::Sender<bool>,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl EventStore {
    /// Creates the store and spawns its batch loops.
    pub fn start(config: EventStoreConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(EventStoreMetrics::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut spawner = LoopSpawner {
            config: &config,
            backend: &backend,
            metrics: &metrics,
            shutdown: &shutdown_rx,
            handles: Vec::with_capacity(4),
        };

        let pageviews = spawner.spawn::<PageView>();
        let custom_events = spawner.spawn::<CustomEvent>();
        let outbound_link_clicks = spawner.spawn::<OutboundLinkClick>();
        let file_downloads = spawner.spawn::<FileDownload>();
        let handles = spawner.handles;

        info!(
            driver = backend.driver_name(),
            max_batch_size = config.max_batch_size,
            max_batch_timeout_ms = config.max_batch_timeout_ms,
            ring_buffer_capacity = config.ring_buffer_capacity(),
            "Started event store"
        );

        Ok(Self {
            pageviews,
            custom_events,
            outbound_link_clicks,
            file_downloads,
            backend,
            metrics,
            shutdown,
            loops: Mutex::new(handles),
        })
    }

    pub fn store_pageview(&self, pageview: PageView) {
        self.push(&self.pageviews, pageview);
    }

    pub fn store_custom_event(&self, event: CustomEvent) {
        self.push(&self.custom_events, event);
    }

    pub fn store_outbound_link_click(&self, click: OutboundLinkClick) {
        self.push(&self.outbound_link_clicks, click);
    }

    pub fn store_file_download(&self, download: FileDownload) {
        self.push(&self.file_downloads, download);
    }

    fn push<E: EmitRows>(&self, ring: &RingProducer<E>, event: E) {
        if !ring.push(event) {
            self.metrics.kind(E::KIND).ring_buffer_dropped_events.inc();
            debug!(kind = %E::KIND, "Ring buffer full, dropping event");
        }
    }

    /// Runs a read-only query against the backend.
    pub async fn query(&self, statement: &str) -> Result<Vec<QueryRow>> {
        ensure_read_only(self.backend.driver_name(), statement)?;
        self.backend.query(statement).await
    }

    pub async fn query_row(&self, statement: &str) -> Result<Option<QueryRow>> {
        ensure_read_only(self.backend.driver_name(), statement)?;
        self.backend.query_row(statement).await
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn metrics(&self) -> Arc<EventStoreMetrics> {
        self.metrics.clone()
    }

    /// Stops the batch loops after they sent everything still buffered.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);

        let handles = std::mem::take(&mut *self.loops.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Batch loop panicked");
            }
        }

        info!("Event store stopped");
    }
}

struct LoopSpawner<'a> {
    config: &'a EventStoreConfig,
    backend: &'a Arc<dyn Backend>,
    metrics: &'a Arc<EventStoreMetrics>,
    shutdown: &'a watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl LoopSpawner<'_> {
    fn spawn<E: EmitRows>(&mut self) -> RingProducer<E> {
        let (producer, consumer) = ring_buffer(self.config.ring_buffer_capacity());

        let batch_loop = BatchLoop::<E> {
            ring: consumer,
            batch: Batch::new(),
            backend: self.backend.clone(),
            metrics: self.metrics.clone(),
            shutdown: self.shutdown.clone(),
            max_batch_size: self.config.max_batch_size,
            max_batch_timeout: self.config.max_batch_timeout(),
            max_send_attempts: self.config.max_send_attempts,
            retry_backoff: self.config.retry_backoff(),
        };
        self.handles.push(tokio::spawn(batch_loop.run()));

        producer
    }
}

enum Wakeup<E> {
    Event(E),
    Timeout,
    Shutdown,
}

struct BatchLoop<E: EmitRows> {
    ring: RingConsumer<E>,
    batch: Batch<E::Row>,
    backend: Arc<dyn Backend>,
    metrics: Arc<EventStoreMetrics>,
    shutdown: watch::Receiver<bool>,
    max_batch_size: usize,
    max_batch_timeout: Duration,
    max_send_attempts: u32,
    retry_backoff: Duration,
}

impl<E: EmitRows> BatchLoop<E> {
    async fn run(mut self) {
        debug!(kind = %E::KIND, "Batch loop started");

        loop {
            let deadline = self.batch.deadline(self.max_batch_timeout);
            let wake_at = deadline.unwrap_or_else(|| Instant::now() + self.max_batch_timeout);

            let wakeup = tokio::select! {
                biased;

                _ = self.shutdown.changed() => Wakeup::Shutdown,
                event = self.ring.recv() => match event {
                    Some(event) => Wakeup::Event(event),
                    None => Wakeup::Shutdown,
                },
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => Wakeup::Timeout,
            };

            match wakeup {
                Wakeup::Event(event) => self.append(event).await,
                Wakeup::Timeout => self.flush().await,
                Wakeup::Shutdown => break,
            }
        }

        while let Some(event) = self.ring.try_recv() {
            self.append(event).await;
        }
        self.flush().await;

        debug!(kind = %E::KIND, "Batch loop stopped");
    }

    async fn append(&mut self, event: E) {
        self.batch.push(&event);
        if self.batch.is_full(self.max_batch_size) {
            self.flush().await;
        }
    }

    async fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let (rows, events) = self.batch.take();
        let metrics = self.metrics.kind(E::KIND);
        let started = Instant::now();

        match self.send_with_retry(&rows).await {
            Ok(()) => {
                let elapsed = started.elapsed();
                metrics.send_batch_duration_ms.observe(elapsed.as_millis() as u64);
                metrics.batch_size_events.observe(events as u64);
                metrics.events.inc_by(events as u64);

                debug!(
                    kind = %E::KIND,
                    events = events,
                    rows = rows.len(),
                    latency_ms = %elapsed.as_millis(),
                    "Sent batch"
                );
            }
            Err(e) => {
                metrics.batch_dropped.inc();
                error!(
                    kind = %E::KIND,
                    events = events,
                    rows = rows.len(),
                    error = %e,
                    "Dropping batch after failed retries"
                );
            }
        }
    }

    async fn send_with_retry(&self, rows: &RowBatch) -> Result<()> {
        let mut last_error = None;

        for attempt in 0..self.max_send_attempts {
            if attempt > 0 {
                let backoff = self.retry_backoff * attempt;
                self.metrics.kind(E::KIND).batch_retry.inc();
                warn!(
                    kind = %E::KIND,
                    attempt = attempt,
                    backoff_ms = %backoff.as_millis(),
                    "Retrying batch insert"
                );
                tokio::time::sleep(backoff).await;
            }

            match self.backend.insert(rows).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal("batch insert failed with unknown error")))
    }
}
