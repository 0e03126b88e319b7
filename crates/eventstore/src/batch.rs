//! Per-kind batch accumulator.

use std::time::Duration;
use tokio::time::Instant;

use crate::rows::{BatchRow, EmitRows, RowBatch};

/// Rows accumulated for one event kind.
#[derive(Debug)]
pub struct Batch<R> {
    rows: Vec<R>,
    events: usize,
    opened_at: Option<Instant>,
}

impl<R: BatchRow> Batch<R> {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            events: 0,
            opened_at: None,
        }
    }

    pub fn push<E: EmitRows<Row = R>>(&mut self, event: &E) {
        if self.opened_at.is_none() {
            self.opened_at = Some(Instant::now());
        }
        event.emit_rows(&mut self.rows);
        self.events += 1;
    }

    #[cfg(test)]
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn events(&self) -> usize {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_full(&self, max_rows: usize) -> bool {
        self.rows.len() >= max_rows
    }

    /// Instant at which the batch must be flushed, once it holds a row.
    pub fn deadline(&self, timeout: Duration) -> Option<Instant> {
        self.opened_at.map(|opened| opened + timeout)
    }

    /// Take the rows and reset the batch. Returns the rows and event count.
    pub fn take(&mut self) -> (RowBatch, usize) {
        let events = std::mem::take(&mut self.events);
        self.opened_at = None;
        (R::into_batch(std::mem::take(&mut self.rows)), events)
    }
}

impl<R: BatchRow> Default for Batch<R> {
    fn default() -> Self {
        Self::new()
    }
}
