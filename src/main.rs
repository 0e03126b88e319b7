//! Analytics ingestion service.
//!
//! Cookie-less analytics collection:
//! - Pageviews correlated into visitor sessions held in memory
//! - Custom events, outbound link clicks and file downloads attached to
//!   the session of their page
//! - Micro-batched storage into ClickHouse (or in-process tables)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use validator::Validate;

use api::{router, ApiConfig, AppState};
use clickhouse_backend::{ClickHouseBackend, ClickHouseConfig};
use eventstore::{Backend, BackendKind, EventStore, EventStoreConfig, MemoryBackend};
use sessionstore::{SessionStore, SessionStoreConfig};
use telemetry::{init_tracing, HealthRegistry, TracingConfig};

/// Interval between backend connection checks.
const BACKEND_HEALTH_INTERVAL: Duration = Duration::from_secs(15);

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    log: TracingConfig,

    #[serde(default)]
    api: ApiConfig,

    #[serde(default)]
    sessionstore: SessionStoreConfig,

    #[serde(default)]
    eventstore: EventStoreConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log: TracingConfig::default(),
            api: ApiConfig::default(),
            sessionstore: SessionStoreConfig::default(),
            eventstore: EventStoreConfig::default(),
            clickhouse: ClickHouseConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = load_config()?;

    init_tracing(&config.log);

    info!("Starting analytics ingestion v{}", env!("CARGO_PKG_VERSION"));

    config.api.validate().context("Invalid api configuration")?;

    let health = Arc::new(HealthRegistry::new());

    let backend = create_backend(&config, &health).await;
    let _backend_health = start_backend_health_check(&config, health.clone());

    let sessions = Arc::new(
        SessionStore::new(config.sessionstore.clone()).context("Failed to create session store")?,
    );
    let _gc_handle = sessions.clone().start_gc();

    let events = Arc::new(
        EventStore::start(config.eventstore.clone(), backend)
            .context("Failed to start event store")?,
    );
    health.eventstore.set_healthy();

    let state = AppState::new(config.api.clone(), sessions, events.clone(), health.clone());

    let _rate_limiter_cleanup = state.start_rate_limiter_cleanup();
    info!("Started rate limiter cleanup task");

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down...");

    // Send what is still buffered
    health.eventstore.set_unhealthy("Shutting down");
    events.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("INGESTION")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(url) = std::env::var("INGESTION_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(database) = std::env::var("INGESTION_CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("INGESTION_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("INGESTION_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }
    if let Ok(backend) = std::env::var("INGESTION_EVENTSTORE_BACKEND") {
        config.eventstore.backend = match backend.trim().to_ascii_lowercase().as_str() {
            "memory" => BackendKind::Memory,
            "clickhouse" => BackendKind::Clickhouse,
            other => anyhow::bail!("Unknown event store backend: {}", other),
        };
    }
    if let Ok(filter) = std::env::var("INGESTION_LOG_FILTER") {
        config.log.filter = filter;
    }

    Ok(config)
}

/// Creates the configured event backend and its schema.
async fn create_backend(config: &Config, health: &HealthRegistry) -> Arc<dyn Backend> {
    match config.eventstore.backend {
        BackendKind::Memory => {
            warn!("Using in-memory event backend, events are lost on restart");
            health.backend.set_healthy();
            Arc::new(MemoryBackend::new())
        }
        BackendKind::Clickhouse => {
            let backend = ClickHouseBackend::new(config.clickhouse.clone());

            if let Err(e) = clickhouse_backend::init_schema(&backend).await {
                error!("Failed to initialize ClickHouse schema: {}", e);
                // Continue anyway - schema might already exist
            }

            if clickhouse_backend::check_connection(backend.client()).await {
                health.backend.set_healthy();
                info!("ClickHouse connection: healthy");
            } else {
                health.backend.set_unhealthy("Connection failed");
                error!("ClickHouse connection: unhealthy");
            }

            Arc::new(backend)
        }
    }
}

/// Periodically refreshes the backend component health.
fn start_backend_health_check(
    config: &Config,
    health: Arc<HealthRegistry>,
) -> Option<tokio::task::JoinHandle<()>> {
    if config.eventstore.backend != BackendKind::Clickhouse {
        return None;
    }

    let backend = ClickHouseBackend::new(config.clickhouse.clone());
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(BACKEND_HEALTH_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            if clickhouse_backend::check_connection(backend.client()).await {
                if !health.backend.is_healthy() {
                    info!("ClickHouse connection recovered");
                }
                health.backend.set_healthy();
            } else {
                health.backend.set_unhealthy("Connection failed");
            }
        }
    }))
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
