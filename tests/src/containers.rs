//! Testcontainer setup for ClickHouse.
//!
//! Set `INGESTION_TEST_CLICKHOUSE_URL` to run against an existing server
//! instead of starting a container.

use clickhouse_backend::ClickHouseConfig;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const TEST_DATABASE: &str = "analytics";

/// Container handle for ClickHouse.
pub struct TestContainers {
    #[allow(dead_code)]
    container: Option<ContainerAsync<GenericImage>>,
    pub clickhouse: ClickHouseConfig,
}

impl TestContainers {
    /// Start ClickHouse container.
    pub async fn start() -> Self {
        if let Some(url) = std::env::var("INGESTION_TEST_CLICKHOUSE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
        {
            return Self {
                container: None,
                clickhouse: ClickHouseConfig {
                    url,
                    database: std::env::var("INGESTION_TEST_CLICKHOUSE_DB")
                        .unwrap_or_else(|_| TEST_DATABASE.to_string()),
                    username: std::env::var("INGESTION_TEST_CLICKHOUSE_USER").ok(),
                    password: std::env::var("INGESTION_TEST_CLICKHOUSE_PASSWORD").ok(),
                    ..Default::default()
                },
            };
        }

        let (container, url) = start_clickhouse().await;

        Self {
            container: Some(container),
            clickhouse: ClickHouseConfig {
                url,
                database: TEST_DATABASE.to_string(),
                username: Some("default".to_string()),
                password: None,
                ..Default::default()
            },
        }
    }
}

/// Start ClickHouse container, return container and HTTP URL.
pub async fn start_clickhouse() -> (ContainerAsync<GenericImage>, String) {
    // CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT=1 allows creating users without password
    let image = GenericImage::new("clickhouse/clickhouse-server", "24.3")
        .with_wait_for(WaitFor::seconds(5))
        .with_exposed_port(8123.tcp())
        .with_env_var("CLICKHOUSE_DB", TEST_DATABASE)
        .with_env_var("CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT", "1")
        .with_env_var("CLICKHOUSE_USER", "default")
        .with_env_var("CLICKHOUSE_PASSWORD", "");

    let container = image.start().await.expect("Failed to start ClickHouse");

    let port = container.get_host_port_ipv4(8123).await.unwrap();
    let url = format!("http://127.0.0.1:{}", port);

    wait_for_http(&url, Duration::from_secs(30)).await;

    (container, url)
}

/// Wait for HTTP endpoint to respond.
async fn wait_for_http(url: &str, timeout: Duration) {
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();

    while start.elapsed() < timeout {
        if let Ok(resp) = client.get(url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("HTTP endpoint {} not ready after {:?}", url, timeout);
}
