//! Batch inserts into ClickHouse.
//!
//! Rows are written in RowBinary: timestamps as DateTime64(3) milliseconds,
//! uuids as strings.

use crate::client::ClickHouseClient;
use clickhouse::Row;
use eventstore::{CustomEventRow, FileDownloadRow, OutboundLinkClickRow, RowBatch, SessionRow};
use ingest_core::{Error, Result};
use serde::Serialize;
use tracing::debug;

pub(crate) const DRIVER: &str = "clickhouse";

#[derive(Debug, Clone, Row, Serialize)]
pub struct SessionInsertRow {
    pub domain: String,
    pub entry_path: String,
    pub exit_timestamp: i64,
    pub exit_path: String,
    pub visitor_id: String,
    pub session_uuid: String,
    pub operating_system: String,
    pub browser_family: String,
    pub device: String,
    pub referrer_domain: String,
    pub country_code: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_term: String,
    pub utm_content: String,
    pub exit_status: u16,
    pub version: u16,
    pub sign: i8,
}

impl From<&SessionRow> for SessionInsertRow {
    fn from(row: &SessionRow) -> Self {
        Self {
            domain: row.domain.clone(),
            entry_path: row.entry_path.clone(),
            exit_timestamp: row.exit_timestamp.timestamp_millis(),
            exit_path: row.exit_path.clone(),
            visitor_id: row.visitor_id.clone(),
            session_uuid: row.session_uuid.to_string(),
            operating_system: row.operating_system.clone(),
            browser_family: row.browser_family.clone(),
            device: row.device.clone(),
            referrer_domain: row.referrer_domain.clone(),
            country_code: row.country_code.clone(),
            utm_source: row.utm_source.clone(),
            utm_medium: row.utm_medium.clone(),
            utm_campaign: row.utm_campaign.clone(),
            utm_term: row.utm_term.clone(),
            utm_content: row.utm_content.clone(),
            exit_status: row.exit_status,
            version: row.version,
            sign: row.sign,
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct CustomEventInsertRow {
    pub timestamp: i64,
    pub domain: String,
    pub path: String,
    pub visitor_id: String,
    pub session_uuid: String,
    pub name: String,
    pub keys: Vec<String>,
    pub values: Vec<String>,
}

impl From<&CustomEventRow> for CustomEventInsertRow {
    fn from(row: &CustomEventRow) -> Self {
        Self {
            timestamp: row.context.timestamp.timestamp_millis(),
            domain: row.context.domain.clone(),
            path: row.context.path.clone(),
            visitor_id: row.context.visitor_id.clone(),
            session_uuid: row.context.session_uuid.to_string(),
            name: row.name.clone(),
            keys: row.keys.clone(),
            values: row.values.clone(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct OutboundLinkClickInsertRow {
    pub timestamp: i64,
    pub domain: String,
    pub path: String,
    pub visitor_id: String,
    pub session_uuid: String,
    pub link: String,
}

impl From<&OutboundLinkClickRow> for OutboundLinkClickInsertRow {
    fn from(row: &OutboundLinkClickRow) -> Self {
        Self {
            timestamp: row.context.timestamp.timestamp_millis(),
            domain: row.context.domain.clone(),
            path: row.context.path.clone(),
            visitor_id: row.context.visitor_id.clone(),
            session_uuid: row.context.session_uuid.to_string(),
            link: row.link.clone(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct FileDownloadInsertRow {
    pub timestamp: i64,
    pub domain: String,
    pub path: String,
    pub visitor_id: String,
    pub session_uuid: String,
    pub url: String,
}

impl From<&FileDownloadRow> for FileDownloadInsertRow {
    fn from(row: &FileDownloadRow) -> Self {
        Self {
            timestamp: row.context.timestamp.timestamp_millis(),
            domain: row.context.domain.clone(),
            path: row.context.path.clone(),
            visitor_id: row.context.visitor_id.clone(),
            session_uuid: row.context.session_uuid.to_string(),
            url: row.url.clone(),
        }
    }
}

/// Inserts a batch into the table of its kind in a single request.
pub async fn insert_batch(client: &ClickHouseClient, batch: &RowBatch) -> Result<()> {
    let table = batch.table();
    match batch {
        RowBatch::Sessions(rows) => insert_rows::<SessionInsertRow, _>(client, table, rows).await,
        RowBatch::CustomEvents(rows) => {
            insert_rows::<CustomEventInsertRow, _>(client, table, rows).await
        }
        RowBatch::OutboundLinkClicks(rows) => {
            insert_rows::<OutboundLinkClickInsertRow, _>(client, table, rows).await
        }
        RowBatch::FileDownloads(rows) => {
            insert_rows::<FileDownloadInsertRow, _>(client, table, rows).await
        }
    }
}

async fn insert_rows<T, S>(client: &ClickHouseClient, table: &str, rows: &[S]) -> Result<()>
where
    T: Row + Serialize + for<'a> From<&'a S>,
{
    if rows.is_empty() {
        return Ok(());
    }

    let start = std::time::Instant::now();

    let mut insert = client
        .inner()
        .insert::<T>(table)
        .map_err(|e| Error::backend(DRIVER, format!("Insert error: {}", e)))?;

    for row in rows {
        insert
            .write(&T::from(row))
            .await
            .map_err(|e| Error::backend(DRIVER, format!("Write error: {}", e)))?;
    }

    insert
        .end()
        .await
        .map_err(|e| Error::backend(DRIVER, format!("End error: {}", e)))?;

    debug!(
        table = table,
        count = rows.len(),
        latency_ms = %start.elapsed().as_millis(),
        "Inserted rows to ClickHouse"
    );

    Ok(())
}
