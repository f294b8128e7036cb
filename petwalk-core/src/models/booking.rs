use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::CoreError;

/// Booking status in the walk lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    WalkerApplied,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

/// Events that move a booking (or an application) between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply,
    Confirm,
    Reject,
    Cancel,
    Start,
    Complete,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Transition::Apply => "apply to",
            Transition::Confirm => "confirm",
            Transition::Reject => "reject",
            Transition::Cancel => "cancel",
            Transition::Start => "start",
            Transition::Complete => "complete",
        };
        f.write_str(verb)
    }
}

impl BookingStatus {
    /// The closed transition table. Everything not listed is rejected.
    pub fn apply(self, transition: Transition) -> Result<BookingStatus, CoreError> {
        use BookingStatus::*;
        use Transition::*;

        let next = match (self, transition) {
            (Pending, Apply) => WalkerApplied,
            (Pending | WalkerApplied, Confirm) => Confirmed,
            (Pending | WalkerApplied, Reject) => Rejected,
            (Pending | WalkerApplied | Confirmed, Cancel) => Cancelled,
            (Confirmed, Start) => InProgress,
            (InProgress, Complete) => Completed,
            (from, t) => {
                return Err(CoreError::InvalidState(format!(
                    "cannot {} a booking that is {}",
                    t, from
                )))
            }
        };
        Ok(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::WalkerApplied => "WALKER_APPLIED",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "WALKER_APPLIED" => Ok(BookingStatus::WalkerApplied),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "IN_PROGRESS" => Ok(BookingStatus::InProgress),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "REJECTED" => Ok(BookingStatus::Rejected),
            other => Err(CoreError::InvalidInput(format!("unknown booking status {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingMethod {
    WalkerSelection,
    OpenRequest,
}

impl BookingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingMethod::WalkerSelection => "WALKER_SELECTION",
            BookingMethod::OpenRequest => "OPEN_REQUEST",
        }
    }
}

impl FromStr for BookingMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WALKER_SELECTION" => Ok(BookingMethod::WalkerSelection),
            "OPEN_REQUEST" => Ok(BookingMethod::OpenRequest),
            other => Err(CoreError::InvalidInput(format!("unknown booking method {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Place {
    pub location: String,
    pub address: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteKind {
    Request,
    WalkerMemo,
    TerminationRequest,
}

/// One line of the append-only booking notes log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteEntry {
    pub at: DateTime<Utc>,
    pub author: Uuid,
    pub kind: NoteKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhotoPhase {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalkPhotos {
    pub start: Option<String>,
    pub middle: Option<String>,
    pub end: Option<String>,
}

impl WalkPhotos {
    pub fn set(&mut self, phase: PhotoPhase, url: String) {
        match phase {
            PhotoPhase::Start => self.start = Some(url),
            PhotoPhase::Middle => self.middle = Some(url),
            PhotoPhase::End => self.end = Some(url),
        }
    }
}

/// A walk booking. Never deleted; terminal statuses are kept for history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub walker_id: Option<Uuid>,
    pub pet_id: Uuid,
    pub method: BookingMethod,
    pub status: BookingStatus,
    pub date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub total_price: f64,
    pub pickup: Option<Place>,
    pub dropoff: Option<Place>,
    pub emergency_contact: Option<String>,
    pub insurance_covered: bool,
    pub notes: Vec<NoteEntry>,
    pub regular_package: bool,
    pub package_frequency: Option<String>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub photos: WalkPhotos,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Runs `transition` through the status table and stamps `updated_at`.
    pub fn transition(&mut self, transition: Transition, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.status = self.status.apply(transition)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_open_request(&self) -> bool {
        self.method == BookingMethod::OpenRequest
    }

    pub fn add_note(&mut self, author: Uuid, kind: NoteKind, text: String, at: DateTime<Utc>) {
        self.notes.push(NoteEntry { at, author, kind, text });
    }

    /// Flat estimate used for open requests and as the fallback bid price.
    pub fn estimate_price(hourly_rate: f64, duration_minutes: i32) -> f64 {
        hourly_rate * f64::from(duration_minutes) / 60.0
    }
}

/// A walker's bid on an open request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub walker_id: Uuid,
    pub proposed_price: Option<f64>,
    pub message: Option<String>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        booking_id: Uuid,
        walker_id: Uuid,
        proposed_price: Option<f64>,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            id: Uuid::new_v4(),
            booking_id,
            walker_id,
            proposed_price,
            message,
            status: BookingStatus::Pending.apply(Transition::Apply)?,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn transition(&mut self, transition: Transition, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.status = self.status.apply(transition)?;
        self.updated_at = now;
        Ok(())
    }
}
