//! ClickHouse health checks and schema setup.

use crate::client::ClickHouseClient;
use crate::schema::all_tables;
use eventstore::Backend;
use ingest_core::Result;
use tracing::{debug, error, info};

/// Check ClickHouse connection health.
pub async fn check_connection(client: &ClickHouseClient) -> bool {
    match client.inner().query("SELECT 1").fetch_one::<u8>().await {
        Ok(_) => {
            debug!("ClickHouse connection healthy");
            true
        }
        Err(e) => {
            error!("ClickHouse health check failed: {}", e);
            false
        }
    }
}

/// Creates the tables and views that are missing.
pub async fn init_schema(backend: &dyn Backend) -> Result<()> {
    let statements = all_tables();
    for ddl in &statements {
        backend.exec(ddl).await?;
    }

    info!(
        driver = backend.driver_name(),
        statements = statements.len(),
        "Schema initialized"
    );
    Ok(())
}
