//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use telemetry::HealthReport;

use crate::state::AppState;

/// GET /health - Component report.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health.report())
}

/// GET /health/ready - Readiness probe (can accept traffic).
pub async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    if state.health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    StatusCode::OK
}
