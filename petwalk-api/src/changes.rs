use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use petwalk_core::models::{BookingChangeRequest, ChangeStatus, ProposedChanges};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::Actor, state::AppState};

#[derive(Debug, Deserialize)]
pub struct RequestChange {
    pub changes: ProposedChanges,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondChange {
    pub decision: ChangeStatus,
    pub response: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/{id}/changes", post(request_change).get(list_changes))
        .route("/v1/changes/pending", get(pending_changes))
        .route("/v1/changes/{id}", patch(respond_change))
}

/// POST /v1/bookings/{id}/changes
async fn request_change(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<RequestChange>,
) -> Result<(StatusCode, Json<BookingChangeRequest>), AppError> {
    let request = state
        .changes
        .request(booking_id, actor, req.changes, req.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /v1/bookings/{id}/changes
async fn list_changes(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Vec<BookingChangeRequest>>, AppError> {
    Ok(Json(state.changes.list_for_booking(booking_id, actor).await?))
}

/// GET /v1/changes/pending
async fn pending_changes(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
) -> Result<Json<Vec<BookingChangeRequest>>, AppError> {
    Ok(Json(state.changes.pending_for(actor).await?))
}

/// PATCH /v1/changes/{id}
async fn respond_change(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(change_id): Path<Uuid>,
    Json(req): Json<RespondChange>,
) -> Result<Json<BookingChangeRequest>, AppError> {
    let resolved = state
        .changes
        .respond(change_id, actor, req.decision, req.response)
        .await?;
    Ok(Json(resolved))
}
