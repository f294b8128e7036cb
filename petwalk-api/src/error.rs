use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use petwalk_core::{CoreError, ErrorKind};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::InvalidState | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidInput | ErrorKind::LocationRequired | ErrorKind::InvalidCoordinates => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::UnrealisticLocationChange => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::Core(err) => {
                let kind = err.kind();
                let status = status_for(kind);
                if status.is_server_error() {
                    tracing::error!("Internal Server Error: {}", err);
                    (status, kind.as_str(), "Internal Server Error".to_string())
                } else {
                    (status, kind.as_str(), err.to_string())
                }
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorKind::InvalidInput.as_str(), msg),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorKind::Internal.as_str(),
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}
