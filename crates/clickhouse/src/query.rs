//! Read helpers for verification and test cleanup.

use crate::client::ClickHouseClient;
use crate::insert::DRIVER;
use eventstore::table_name;
use ingest_core::{Error, EventKind, Result};

/// Count rows in `table`.
pub async fn count_rows(client: &ClickHouseClient, table: &str) -> Result<u64> {
    let count: u64 = client
        .inner()
        .query(&format!("SELECT count() FROM {}", table))
        .fetch_one()
        .await
        .map_err(|e| Error::backend(DRIVER, format!("Query error: {}", e)))?;
    Ok(count)
}

/// Net number of live sessions, collapsing cancelled versions.
pub async fn count_sessions(client: &ClickHouseClient) -> Result<i64> {
    let count: i64 = client
        .inner()
        .query("SELECT toInt64(sum(sign)) FROM sessions")
        .fetch_one()
        .await
        .map_err(|e| Error::backend(DRIVER, format!("Query error: {}", e)))?;
    Ok(count)
}

/// Empties every event table (test cleanup).
pub async fn truncate_tables(client: &ClickHouseClient) -> Result<()> {
    let tables = EventKind::ALL
        .iter()
        .map(|kind| table_name(*kind))
        .chain(std::iter::once("pageviews"));

    for table in tables {
        client
            .inner()
            .query(&format!("TRUNCATE TABLE IF EXISTS {}", table))
            .execute()
            .await
            .map_err(|e| Error::backend(DRIVER, format!("Truncate error: {}", e)))?;
    }
    Ok(())
}
