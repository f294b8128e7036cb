use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use petwalk_notify::SchedulerStatus;
use prometheus::{Encoder, TextEncoder};

use crate::{error::AppError, state::AppState};

/// Authenticated operator routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/admin/scheduler", get(scheduler_status))
}

/// Unauthenticated health and metrics endpoints.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

async fn health() -> &'static str {
    "OK"
}

/// GET /v1/admin/scheduler
async fn scheduler_status(State(state): State<AppState>) -> Result<Json<SchedulerStatus>, AppError> {
    Ok(Json(state.scheduler.status().await?))
}

/// GET /metrics
async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&state.metrics.registry.gather(), &mut buffer) {
        tracing::error!("Metrics encoding failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new()).into_response();
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        String::from_utf8_lossy(&buffer).into_owned(),
    )
        .into_response()
}
