use chrono::{DateTime, Utc};
use petwalk_core::models::{Booking, Place};
use petwalk_tracking::PathStatistics;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Owner's request for a new walk. `walker_id` is required for direct
/// bookings and ignored for open requests.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub walker_id: Option<Uuid>,
    pub pet_id: Uuid,
    pub date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub pickup: Option<Place>,
    pub dropoff: Option<Place>,
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub insurance_covered: bool,
    pub notes: Option<String>,
    #[serde(default)]
    pub regular_package: bool,
    pub package_frequency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplyRequest {
    pub proposed_price: Option<f64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationDecision {
    Confirm,
    Reject,
    Cancel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyKind {
    Police,
    Fire,
    EmergencyContact,
}

/// What the caller should dial.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmergencyDispatch {
    pub booking_id: Uuid,
    pub kind: EmergencyKind,
    pub number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedWalk {
    pub booking: Booking,
    pub statistics: PathStatistics,
}
