use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::booking::{Booking, NoteKind, Place};
use crate::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStatus {
    Pending,
    Approved,
    Rejected,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Pending => "PENDING",
            ChangeStatus::Approved => "APPROVED",
            ChangeStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for ChangeStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ChangeStatus::Pending),
            "APPROVED" => Ok(ChangeStatus::Approved),
            "REJECTED" => Ok(ChangeStatus::Rejected),
            other => Err(CoreError::InvalidInput(format!("unknown change status {}", other))),
        }
    }
}

/// Sparse set of booking fields a party wants changed. `None` means "keep".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProposedChanges {
    pub date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub price: Option<f64>,
    pub pickup_location: Option<String>,
    pub pickup_address: Option<String>,
    pub dropoff_location: Option<String>,
    pub dropoff_address: Option<String>,
    pub notes: Option<String>,
    pub insurance_covered: Option<bool>,
}

impl ProposedChanges {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.duration_minutes.is_none()
            && self.price.is_none()
            && self.pickup_location.is_none()
            && self.pickup_address.is_none()
            && self.dropoff_location.is_none()
            && self.dropoff_address.is_none()
            && self.notes.is_none()
            && self.insurance_covered.is_none()
    }

    /// Copies the set fields onto `booking`. Notes are appended, never replaced.
    pub fn apply_to(&self, booking: &mut Booking, author: Uuid, now: DateTime<Utc>) {
        if let Some(date) = self.date {
            booking.date = date;
        }
        if let Some(duration) = self.duration_minutes {
            booking.duration_minutes = duration;
        }
        if let Some(price) = self.price {
            booking.total_price = price;
        }
        merge_place(
            &mut booking.pickup,
            self.pickup_location.as_ref(),
            self.pickup_address.as_ref(),
        );
        merge_place(
            &mut booking.dropoff,
            self.dropoff_location.as_ref(),
            self.dropoff_address.as_ref(),
        );
        if let Some(notes) = &self.notes {
            booking.add_note(author, NoteKind::Request, notes.clone(), now);
        }
        if let Some(insured) = self.insurance_covered {
            booking.insurance_covered = insured;
        }
        booking.updated_at = now;
    }
}

fn merge_place(place: &mut Option<Place>, location: Option<&String>, address: Option<&String>) {
    if location.is_none() && address.is_none() {
        return;
    }
    let current = place.get_or_insert_with(|| Place {
        location: String::new(),
        address: String::new(),
    });
    if let Some(location) = location {
        current.location = location.clone();
    }
    if let Some(address) = address {
        current.address = address.clone();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingChangeRequest {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub requested_by: Uuid,
    pub changes: ProposedChanges,
    pub reason: Option<String>,
    pub status: ChangeStatus,
    pub response: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::{BookingMethod, BookingStatus, WalkPhotos};

    fn booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            walker_id: Some(Uuid::new_v4()),
            pet_id: Uuid::new_v4(),
            method: BookingMethod::WalkerSelection,
            status: BookingStatus::Confirmed,
            date: now,
            duration_minutes: 60,
            total_price: 20000.0,
            pickup: Some(Place {
                location: "Park gate".into(),
                address: "1 Main St".into(),
            }),
            dropoff: None,
            emergency_contact: None,
            insurance_covered: false,
            notes: Vec::new(),
            regular_package: false,
            package_frequency: None,
            actual_start: None,
            actual_end: None,
            photos: WalkPhotos::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_apply_only_touches_set_fields() {
        let mut b = booking();
        let author = b.owner_id;
        let changes = ProposedChanges {
            duration_minutes: Some(90),
            pickup_address: Some("2 Main St".into()),
            ..Default::default()
        };
        changes.apply_to(&mut b, author, Utc::now());

        assert_eq!(b.duration_minutes, 90);
        assert_eq!(b.total_price, 20000.0);
        let pickup = b.pickup.unwrap();
        assert_eq!(pickup.location, "Park gate");
        assert_eq!(pickup.address, "2 Main St");
        assert!(b.notes.is_empty());
    }

    #[test]
    fn test_notes_are_appended() {
        let mut b = booking();
        let author = b.owner_id;
        let changes = ProposedChanges {
            notes: Some("bring water".into()),
            ..Default::default()
        };
        assert!(!changes.is_empty());
        changes.apply_to(&mut b, author, Utc::now());
        assert_eq!(b.notes.len(), 1);
        assert_eq!(b.notes[0].kind, NoteKind::Request);
        assert!(ProposedChanges::default().is_empty());
    }
}
