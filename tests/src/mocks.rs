//! Mock implementations for testing.

use async_trait::async_trait;
use eventstore::{
    Backend, CustomEventRow, FileDownloadRow, OutboundLinkClickRow, QueryRow, RowBatch, SessionRow,
};
use ingest_core::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Backend that captures inserted batches in memory.
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Batches accepted by this backend, in insert order.
    batches: Arc<Mutex<Vec<RowBatch>>>,
    /// Number of insert calls, failed ones included.
    attempts: Arc<Mutex<usize>>,
    /// Simulate failures if set.
    should_fail: Arc<Mutex<bool>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured batches.
    pub fn captured_batches(&self) -> Vec<RowBatch> {
        self.batches.lock().clone()
    }

    pub fn insert_attempts(&self) -> usize {
        *self.attempts.lock()
    }

    pub fn sessions(&self) -> Vec<SessionRow> {
        self.collect(|batch| match batch {
            RowBatch::Sessions(rows) => rows.clone(),
            _ => Vec::new(),
        })
    }

    pub fn custom_events(&self) -> Vec<CustomEventRow> {
        self.collect(|batch| match batch {
            RowBatch::CustomEvents(rows) => rows.clone(),
            _ => Vec::new(),
        })
    }

    pub fn outbound_link_clicks(&self) -> Vec<OutboundLinkClickRow> {
        self.collect(|batch| match batch {
            RowBatch::OutboundLinkClicks(rows) => rows.clone(),
            _ => Vec::new(),
        })
    }

    pub fn file_downloads(&self) -> Vec<FileDownloadRow> {
        self.collect(|batch| match batch {
            RowBatch::FileDownloads(rows) => rows.clone(),
            _ => Vec::new(),
        })
    }

    /// Total rows captured across all kinds.
    pub fn row_count(&self) -> usize {
        self.batches.lock().iter().map(RowBatch::len).sum()
    }

    /// Clear captured batches.
    pub fn clear(&self) {
        self.batches.lock().clear();
    }

    /// Set failure mode for testing error handling.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    fn collect<T>(&self, rows: impl Fn(&RowBatch) -> Vec<T>) -> Vec<T> {
        self.batches.lock().iter().flat_map(rows).collect()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn driver_name(&self) -> &'static str {
        "mock"
    }

    async fn exec(&self, _statement: &str) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _statement: &str) -> Result<Vec<QueryRow>> {
        Ok(Vec::new())
    }

    async fn insert(&self, batch: &RowBatch) -> Result<()> {
        *self.attempts.lock() += 1;
        if *self.should_fail.lock() {
            return Err(Error::backend("mock", "Mock backend failure"));
        }

        self.batches.lock().push(batch.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_captures_batches() {
        let mock = MockBackend::new();

        mock.insert(&RowBatch::Sessions(Vec::new())).await.unwrap();
        mock.insert(&RowBatch::CustomEvents(Vec::new())).await.unwrap();

        assert_eq!(mock.captured_batches().len(), 2);
        assert_eq!(mock.insert_attempts(), 2);
        assert_eq!(mock.row_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_backend_failure_mode() {
        let mock = MockBackend::new();
        mock.set_should_fail(true);

        let result = mock.insert(&RowBatch::FileDownloads(Vec::new())).await;
        assert!(result.is_err());
        assert_eq!(mock.insert_attempts(), 1);
        assert!(mock.captured_batches().is_empty());
    }
}
