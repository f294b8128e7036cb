use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lifecycle markers pushed to live viewers.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalkPhase {
    Started,
    Completed,
}

/// Payload carried by the per-booking live channel.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveEvent {
    LocationUpdated {
        booking_id: Uuid,
        sample_id: Uuid,
        latitude: f64,
        longitude: f64,
        speed: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        booking_id: Uuid,
        phase: WalkPhase,
        timestamp: DateTime<Utc>,
    },
}

impl LiveEvent {
    pub fn booking_id(&self) -> Uuid {
        match self {
            LiveEvent::LocationUpdated { booking_id, .. } => *booking_id,
            LiveEvent::StatusChanged { booking_id, .. } => *booking_id,
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::LocationUpdated { .. } => "location",
            LiveEvent::StatusChanged { .. } => "status",
        }
    }
}
