//! API routes.

pub mod events;
pub mod health;
pub mod metrics;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::rate_limit::rate_limit;
use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let events = Router::new()
        .route("/pageviews", post(events::pageview_handler))
        .route("/custom/:name", post(events::custom_handler))
        .route("/outbound-links", post(events::outbound_link_handler))
        .route("/file-downloads", post(events::file_download_handler))
        .route("/identify", post(events::identify_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .nest("/api/v1/events", events)
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
