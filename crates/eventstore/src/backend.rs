//! Storage backend abstraction.

use async_trait::async_trait;
use ingest_core::{Error, Result};

use crate::rows::RowBatch;

/// One result row, column name to value.
pub type QueryRow = serde_json::Map<String, serde_json::Value>;

/// A columnar store receiving event batches.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Driver name, used in logs and errors.
    fn driver_name(&self) -> &'static str;

    /// Executes a statement that returns no rows (DDL, mutations).
    async fn exec(&self, statement: &str) -> Result<()>;

    async fn query(&self, statement: &str) -> Result<Vec<QueryRow>>;

    async fn query_row(&self, statement: &str) -> Result<Option<QueryRow>> {
        Ok(self.query(statement).await?.into_iter().next())
    }

    /// Inserts a batch of rows into the table of its kind in one request.
    async fn insert(&self, batch: &RowBatch) -> Result<()>;
}

/// Rejects statements that are not plain `SELECT` queries.
pub fn ensure_read_only(driver: &'static str, statement: &str) -> Result<()> {
    let statement = statement.trim_start();
    let is_select = statement
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
        && statement[6..].starts_with(char::is_whitespace);

    if is_select {
        Ok(())
    } else {
        Err(Error::read_only(driver))
    }
}
