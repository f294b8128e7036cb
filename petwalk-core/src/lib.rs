pub mod access;
pub mod clock;
pub mod collaborators;
pub mod effects;
pub mod geo;
pub mod memory;
pub mod models;
pub mod repository;
pub mod rules;

pub use clock::{Clock, ManualClock, SystemClock};
pub use effects::best_effort;

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Validation failed: {0}")]
    InvalidInput(String),
    #[error("Location required: {0}")]
    LocationRequired(String),
    #[error("Invalid coordinates: lat={lat}, lon={lon}")]
    InvalidCoordinates { lat: f64, lon: f64 },
    #[error("Unrealistic location change: {speed_kmh:.1} km/h")]
    UnrealisticLocationChange { speed_kmh: f64 },
    #[error("Concurrent modification: {0}")]
    Conflict(String),
    #[error("Internal service error: {0}")]
    Internal(String),
}

/// Stable classification of a [`CoreError`], used by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidState,
    InvalidInput,
    LocationRequired,
    InvalidCoordinates,
    UnrealisticLocationChange,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::LocationRequired => "LOCATION_REQUIRED",
            ErrorKind::InvalidCoordinates => "INVALID_COORDINATES",
            ErrorKind::UnrealisticLocationChange => "UNREALISTIC_LOCATION_CHANGE",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
            CoreError::InvalidState(_) => ErrorKind::InvalidState,
            CoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            CoreError::LocationRequired(_) => ErrorKind::LocationRequired,
            CoreError::InvalidCoordinates { .. } => ErrorKind::InvalidCoordinates,
            CoreError::UnrealisticLocationChange { .. } => ErrorKind::UnrealisticLocationChange,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Missing or malformed caller input, including coordinate problems.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidInput | ErrorKind::LocationRequired | ErrorKind::InvalidCoordinates
        )
    }
}

impl From<repository::RepoError> for CoreError {
    fn from(err: repository::RepoError) -> Self {
        CoreError::Internal(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
