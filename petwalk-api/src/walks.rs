use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use petwalk_booking::{CompletedWalk, EmergencyDispatch, EmergencyKind};
use petwalk_core::models::{Booking, LocationSample, PhotoPhase};
use petwalk_tracking::{NewSample, WalkPath};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, middleware::Actor, state::AppState};

#[derive(Debug, Default, Deserialize)]
pub struct CompleteWalkRequest {
    pub special_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TerminationRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct LocationUpdate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoRequest {
    pub phase: PhotoPhase,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct EmergencyRequest {
    pub kind: EmergencyKind,
    pub location: Option<String>,
    pub description: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/walks/{id}/start", post(start_walk))
        .route("/v1/walks/{id}/complete", post(complete_walk))
        .route("/v1/walks/{id}/terminate", post(request_termination))
        .route("/v1/walks/{id}/track", post(append_sample).get(recent_samples))
        .route("/v1/walks/{id}/location", put(update_location))
        .route("/v1/walks/{id}/path", get(walk_path))
        .route("/v1/walks/{id}/photos", post(attach_photo))
        .route("/v1/walks/{id}/emergency", post(emergency_call))
        .route("/v1/walks/{id}/notifications", get(notification_history))
}

/// POST /v1/walks/{id}/start
async fn start_walk(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.start_walk(booking_id, actor).await?))
}

/// POST /v1/walks/{id}/complete
async fn complete_walk(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<CompleteWalkRequest>,
) -> Result<Json<CompletedWalk>, AppError> {
    let completed = state
        .bookings
        .complete_walk(booking_id, actor, req.special_notes)
        .await?;
    Ok(Json(completed))
}

/// POST /v1/walks/{id}/terminate
async fn request_termination(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<TerminationRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(
        state.bookings.request_termination(booking_id, actor, req.reason).await?,
    ))
}

/// POST /v1/walks/{id}/track
async fn append_sample(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(sample): Json<NewSample>,
) -> Result<(StatusCode, Json<LocationSample>), AppError> {
    let stored = state.tracks.append(booking_id, actor, sample).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /v1/walks/{id}/track?since=
async fn recent_samples(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<Vec<LocationSample>>, AppError> {
    let since = query.since.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    Ok(Json(state.tracks.recent(booking_id, actor, since).await?))
}

/// PUT /v1/walks/{id}/location
async fn update_location(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<LocationUpdate>,
) -> Result<Json<LocationSample>, AppError> {
    let stored = state
        .tracks
        .update_current_location(booking_id, actor, req.latitude, req.longitude)
        .await?;
    Ok(Json(stored))
}

/// GET /v1/walks/{id}/path
async fn walk_path(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<WalkPath>, AppError> {
    Ok(Json(state.tracks.path(booking_id, actor).await?))
}

/// POST /v1/walks/{id}/photos
async fn attach_photo(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<PhotoRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(
        state.bookings.attach_photo(booking_id, actor, req.phase, req.url).await?,
    ))
}

/// POST /v1/walks/{id}/emergency
async fn emergency_call(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<EmergencyRequest>,
) -> Result<Json<EmergencyDispatch>, AppError> {
    let dispatch = state
        .bookings
        .emergency_call(booking_id, actor, req.kind, req.location, req.description)
        .await?;
    Ok(Json(dispatch))
}

/// GET /v1/walks/{id}/notifications
async fn notification_history(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Vec<String>>, AppError> {
    state.bookings.get(booking_id, actor).await?;
    Ok(Json(state.notifier.history(booking_id).await?))
}
