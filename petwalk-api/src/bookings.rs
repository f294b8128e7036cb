use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use petwalk_booking::{ApplicationDecision, ApplyRequest, CreateBookingRequest};
use petwalk_core::models::{Application, Booking, BookingStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::Actor, state::AppState};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct RespondApplicationRequest {
    pub decision: ApplicationDecision,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", get(list_mine))
        .route("/v1/bookings/direct", post(create_direct))
        .route("/v1/bookings/open", post(create_open).get(list_open))
        .route("/v1/bookings/walker", get(list_as_walker))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/status", patch(update_status))
        .route("/v1/bookings/{id}/applications", post(apply).get(list_applications))
        .route("/v1/applications/mine", get(my_applications))
        .route("/v1/applications/{id}", patch(respond_to_application))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/bookings/direct
async fn create_direct(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings.create_direct(actor, req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// POST /v1/bookings/open
async fn create_open(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings.create_open(actor, req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /v1/bookings/open
async fn list_open(State(state): State<AppState>) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_open_requests().await?))
}

/// GET /v1/bookings
async fn list_mine(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_for_owner(actor).await?))
}

/// GET /v1/bookings/walker
async fn list_as_walker(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_for_walker(actor).await?))
}

/// GET /v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get(booking_id, actor).await?))
}

/// PATCH /v1/bookings/{id}/status
async fn update_status(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.update_status(booking_id, actor, req.status).await?))
}

/// POST /v1/bookings/{id}/applications
async fn apply(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<Application>), AppError> {
    let application = state.bookings.apply(booking_id, actor, req).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

/// GET /v1/bookings/{id}/applications
async fn list_applications(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Vec<Application>>, AppError> {
    Ok(Json(state.bookings.list_applications(booking_id, actor).await?))
}

/// GET /v1/applications/mine
async fn my_applications(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
) -> Result<Json<Vec<Application>>, AppError> {
    Ok(Json(state.bookings.list_walker_applications(actor).await?))
}

/// PATCH /v1/applications/{id}
async fn respond_to_application(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(application_id): Path<Uuid>,
    Json(req): Json<RespondApplicationRequest>,
) -> Result<Json<Application>, AppError> {
    let application = state
        .bookings
        .respond_to_application(application_id, actor, req.decision)
        .await?;
    Ok(Json(application))
}
