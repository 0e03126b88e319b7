//! In-process backend.
//!
//! Keeps rows in memory for embedded deployments and tests. Supports
//! full table scans (`SELECT * FROM <table>`) as its only query form.

use async_trait::async_trait;
use ingest_core::{EventKind, Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::backend::{Backend, QueryRow};
use crate::rows::{
    table_name, CustomEventRow, FileDownloadRow, OutboundLinkClickRow, RowBatch, SessionRow,
};

const DRIVER: &str = "memory";

/// Rows stored by a [`MemoryBackend`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    pub sessions: Vec<SessionRow>,
    pub custom_events: Vec<CustomEventRow>,
    pub outbound_link_clicks: Vec<OutboundLinkClickRow>,
    pub file_downloads: Vec<FileDownloadRow>,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<MemoryTables>,
    executed: Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all stored rows.
    pub fn tables(&self) -> MemoryTables {
        self.tables.lock().clone()
    }

    pub fn sessions(&self) -> Vec<SessionRow> {
        self.tables.lock().sessions.clone()
    }

    pub fn custom_events(&self) -> Vec<CustomEventRow> {
        self.tables.lock().custom_events.clone()
    }

    /// Statements passed to `exec`.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn driver_name(&self) -> &'static str {
        DRIVER
    }

    async fn exec(&self, statement: &str) -> Result<()> {
        self.executed.lock().push(statement.to_string());
        Ok(())
    }

    async fn query(&self, statement: &str) -> Result<Vec<QueryRow>> {
        let table = scanned_table(statement).ok_or_else(|| {
            Error::backend(DRIVER, format!("unsupported query: {}", statement))
        })?;

        let tables = self.tables.lock();
        match table.as_str() {
            t if t == table_name(EventKind::Pageview) => to_query_rows(&tables.sessions),
            t if t == table_name(EventKind::Custom) => to_query_rows(&tables.custom_events),
            t if t == table_name(EventKind::OutboundLinkClick) => {
                to_query_rows(&tables.outbound_link_clicks)
            }
            t if t == table_name(EventKind::FileDownload) => to_query_rows(&tables.file_downloads),
            other => Err(Error::backend(DRIVER, format!("unknown table: {}", other))),
        }
    }

    async fn insert(&self, batch: &RowBatch) -> Result<()> {
        let mut tables = self.tables.lock();
        match batch {
            RowBatch::Sessions(rows) => tables.sessions.extend_from_slice(rows),
            RowBatch::CustomEvents(rows) => tables.custom_events.extend_from_slice(rows),
            RowBatch::OutboundLinkClicks(rows) => tables.outbound_link_clicks.extend_from_slice(rows),
            RowBatch::FileDownloads(rows) => tables.file_downloads.extend_from_slice(rows),
        }
        debug!(table = batch.table(), rows = batch.len(), "Inserted rows in memory");
        Ok(())
    }
}

/// Table name of a `SELECT * FROM <table>` statement.
fn scanned_table(statement: &str) -> Option<String> {
    let statement = statement.trim().trim_end_matches(';').to_ascii_lowercase();
    let tokens: Vec<&str> = statement.split_whitespace().collect();
    match tokens.as_slice() {
        ["select", "*", "from", table] => Some(table.to_string()),
        _ => None,
    }
}

fn to_query_rows<T: Serialize>(rows: &[T]) -> Result<Vec<QueryRow>> {
    rows.iter()
        .map(|row| match serde_json::to_value(row)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(Error::internal("row did not serialize to an object")),
        })
        .collect()
}
