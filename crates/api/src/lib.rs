//! HTTP API layer for the analytics ingestion service.

pub mod extractors;
pub mod middleware;
pub mod pipeline;
pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::{ApiConfig, AppState};
