//! Event store backend over a ClickHouse server.

use async_trait::async_trait;
use clickhouse::Row;
use eventstore::{Backend, QueryRow, RowBatch};
use ingest_core::{Error, Result};
use serde::Deserialize;
use tracing::debug;

use crate::client::ClickHouseClient;
use crate::config::ClickHouseConfig;
use crate::insert::{insert_batch, DRIVER};

/// One result row rendered by the server as a JSON object.
#[derive(Debug, Row, Deserialize)]
struct JsonRow {
    row: String,
}

#[derive(Clone)]
pub struct ClickHouseBackend {
    client: ClickHouseClient,
}

impl ClickHouseBackend {
    pub fn new(config: ClickHouseConfig) -> Self {
        Self {
            client: ClickHouseClient::new(config),
        }
    }

    pub fn from_client(client: ClickHouseClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }
}

/// Wraps `statement` so every row comes back as a single JSON string column.
fn json_rows_query(statement: &str) -> String {
    let statement = statement.trim().trim_end_matches(';');
    format!(
        "SELECT formatRowNoNewline('JSONEachRow', *) AS row FROM ({})",
        statement
    )
}

#[async_trait]
impl Backend for ClickHouseBackend {
    fn driver_name(&self) -> &'static str {
        DRIVER
    }

    async fn exec(&self, statement: &str) -> Result<()> {
        self.client
            .inner()
            .query(statement)
            .execute()
            .await
            .map_err(|e| Error::backend(DRIVER, format!("Execute error: {}", e)))
    }

    async fn query(&self, statement: &str) -> Result<Vec<QueryRow>> {
        let rows: Vec<JsonRow> = self
            .client
            .inner()
            .query(&json_rows_query(statement))
            .fetch_all()
            .await
            .map_err(|e| Error::backend(DRIVER, format!("Query error: {}", e)))?;

        debug!(rows = rows.len(), "Fetched query rows");

        rows.into_iter()
            .map(|json| serde_json::from_str::<QueryRow>(&json.row).map_err(Error::from))
            .collect()
    }

    async fn insert(&self, batch: &RowBatch) -> Result<()> {
        insert_batch(&self.client, batch).await
    }
}
