use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Router,
};
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{error::AppError, middleware::Actor, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/walks/{id}/stream", get(walk_stream))
}

/// GET /v1/walks/{id}/stream
/// Location and status events for one walk, parties only.
async fn walk_stream(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    state.bookings.get(booking_id, actor).await?;

    let rx = state.live.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.booking_id() == booking_id => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok::<_, Infallible>(Event::default().event(event.name()).data(data)))
            }
            Ok(_) => None,
            Err(lagged) => {
                tracing::debug!(%booking_id, error = %lagged, "live stream subscriber lagged");
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
