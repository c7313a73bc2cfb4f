//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use telemetry::{health, metrics};

use crate::response::{DrainResponse, HealthResponse};
use crate::state::AppState;

/// GET /health - Full health check.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = health().report();

    Json(HealthResponse {
        status: format!("{:?}", report.status).to_lowercase(),
        postgres_connected: health().postgres.is_healthy(),
        model_connected: health().model.is_healthy(),
        handoff_queue_depth: metrics().handoff_queue_depth.get(),
        outstanding_insights: state.drain.outstanding(),
    })
}

/// GET /health/ready - Readiness probe (can accept measurements).
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /insights/drain - Insight tasks still running.
pub async fn drain_handler(State(state): State<AppState>) -> Json<DrainResponse> {
    Json(DrainResponse {
        outstanding: state.drain.outstanding(),
    })
}
