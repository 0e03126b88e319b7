//! Common test setup functions.

use api::extractors::REFERRER_HEADER;
use api::{router, ApiConfig, AppState};
use axum_test::{TestResponse, TestServer};
use clickhouse_backend::{init_schema, ClickHouseBackend, ClickHouseClient};
use eventstore::{Backend, BackendKind, EventStore, EventStoreConfig};
use sessionstore::{SessionStore, SessionStoreConfig};
use std::sync::Arc;
use std::time::Duration;
use telemetry::HealthRegistry;

use crate::containers::TestContainers;
use crate::fixtures::{self, FIREFOX_UA};
use crate::mocks::MockBackend;

/// Time a polling helper waits for rows before giving up.
const ROWS_TIMEOUT: Duration = Duration::from_secs(5);

/// Test context running the real router against a mock backend.
///
/// Batches hold a single row so every stored event reaches the backend
/// as soon as its batch loop runs.
pub struct TestContext {
    pub server: TestServer,
    pub backend: Arc<MockBackend>,
    pub sessions: Arc<SessionStore>,
    pub events: Arc<EventStore>,
    pub health: Arc<HealthRegistry>,
}

impl TestContext {
    /// Create a new test context with all components healthy.
    pub async fn new() -> Self {
        Self::with_config(test_api_config(), test_eventstore_config())
    }

    pub fn with_config(api: ApiConfig, eventstore: EventStoreConfig) -> Self {
        let backend = Arc::new(MockBackend::new());
        let (server, sessions, events, health) =
            build_server(api, eventstore, backend.clone() as Arc<dyn Backend>);

        Self {
            server,
            backend,
            sessions,
            events,
            health,
        }
    }

    /// POST a pageview of `url` from the default test client.
    pub async fn pageview(&self, url: &str, document_referrer: Option<&str>) -> TestResponse {
        let mut request = self
            .server
            .post(fixtures::PAGEVIEWS)
            .add_header("User-Agent", FIREFOX_UA)
            .add_header("X-Forwarded-For", &fixtures::client_ip(1))
            .add_header(REFERRER_HEADER, url);
        if let Some(referrer) = document_referrer {
            request = request.add_header("X-Analytics-Document-Referrer", referrer);
        }
        request.await
    }

    pub async fn custom_event(&self, url: &str, name: &str, properties: serde_json::Value) -> TestResponse {
        self.server
            .post(&fixtures::custom_event(name))
            .add_header("User-Agent", FIREFOX_UA)
            .add_header("X-Forwarded-For", &fixtures::client_ip(1))
            .add_header(REFERRER_HEADER, url)
            .json(&properties)
            .await
    }

    pub async fn outbound_link(&self, url: &str, link: &str) -> TestResponse {
        self.server
            .post(fixtures::OUTBOUND_LINKS)
            .add_header("User-Agent", FIREFOX_UA)
            .add_header("X-Forwarded-For", &fixtures::client_ip(1))
            .add_header(REFERRER_HEADER, url)
            .text(link.to_string())
            .await
    }

    pub async fn file_download(&self, url: &str, file_url: &str) -> TestResponse {
        self.server
            .post(fixtures::FILE_DOWNLOADS)
            .add_header("User-Agent", FIREFOX_UA)
            .add_header("X-Forwarded-For", &fixtures::client_ip(1))
            .add_header(REFERRER_HEADER, url)
            .text(file_url.to_string())
            .await
    }

    pub async fn identify(&self, url: &str, visitor_id: &str) -> TestResponse {
        self.server
            .post(fixtures::IDENTIFY)
            .add_header("User-Agent", FIREFOX_UA)
            .add_header("X-Forwarded-For", &fixtures::client_ip(1))
            .add_header(REFERRER_HEADER, url)
            .json(&serde_json::json!({ "visitorId": visitor_id }))
            .await
    }

    /// Polls the mock backend until it holds at least `count` rows.
    pub async fn wait_for_rows(&self, count: usize) -> usize {
        wait_until(|| self.backend.row_count() >= count).await;
        self.backend.row_count()
    }
}

/// Test context storing into ClickHouse.
pub struct ClickHouseTestContext {
    pub containers: TestContainers,
    pub client: ClickHouseClient,
    pub server: TestServer,
    pub events: Arc<EventStore>,
}

impl ClickHouseTestContext {
    /// Start ClickHouse, create the schema and wire the router to it.
    pub async fn new() -> Self {
        let containers = TestContainers::start().await;

        let client = ClickHouseClient::new(containers.clickhouse.clone());
        let backend = ClickHouseBackend::from_client(client.clone());
        init_schema(&backend)
            .await
            .expect("Failed to initialize schema");
        clickhouse_backend::truncate_tables(backend.client())
            .await
            .expect("Failed to truncate tables");

        let eventstore = EventStoreConfig {
            backend: BackendKind::Clickhouse,
            ..test_eventstore_config()
        };
        let (server, _sessions, events, _health) =
            build_server(test_api_config(), eventstore, Arc::new(backend));

        Self {
            containers,
            client,
            server,
            events,
        }
    }
}

pub fn test_api_config() -> ApiConfig {
    ApiConfig {
        request_timeout_ms: 500,
        ..Default::default()
    }
}

pub fn test_eventstore_config() -> EventStoreConfig {
    EventStoreConfig {
        backend: BackendKind::Memory,
        max_batch_size: 1,
        max_batch_timeout_ms: 50,
        retry_backoff_ms: 10,
        ..Default::default()
    }
}

/// Polls `condition` every 10ms until it holds or the timeout elapses.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let start = std::time::Instant::now();
    while !condition() && start.elapsed() < ROWS_TIMEOUT {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn build_server(
    api: ApiConfig,
    eventstore: EventStoreConfig,
    backend: Arc<dyn Backend>,
) -> (TestServer, Arc<SessionStore>, Arc<EventStore>, Arc<HealthRegistry>) {
    let sessions = Arc::new(
        SessionStore::new(SessionStoreConfig::default()).expect("Failed to create session store"),
    );
    let events = Arc::new(EventStore::start(eventstore, backend).expect("Failed to start event store"));

    let health = Arc::new(HealthRegistry::new());
    health.backend.set_healthy();
    health.eventstore.set_healthy();

    let state = AppState::new(api, sessions.clone(), events.clone(), health.clone());
    let server = TestServer::new(router(state)).expect("Failed to create test server");

    (server, sessions, events, health)
}
