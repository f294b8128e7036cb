use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{Application, Booking, BookingChangeRequest, BookingStatus, LocationSample};

pub type RepoError = Box<dyn std::error::Error + Send + Sync>;
pub type RepoResult<T> = Result<T, RepoError>;

/// Storage for bookings. Writes are guarded by the booking `version`.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> RepoResult<()>;

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>>;

    /// Persists `booking` only if the stored version still equals `booking.version`,
    /// bumping it by one. Returns `false` when another writer got there first.
    async fn update_booking(&self, booking: &Booking) -> RepoResult<bool>;

    async fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Booking>>;

    async fn list_by_walker(&self, walker_id: Uuid) -> RepoResult<Vec<Booking>>;

    async fn list_by_status(&self, status: BookingStatus) -> RepoResult<Vec<Booking>>;

    /// Open requests still waiting for a walker.
    async fn list_open_requests(&self) -> RepoResult<Vec<Booking>>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn insert_application(&self, application: &Application) -> RepoResult<()>;

    async fn get_application(&self, id: Uuid) -> RepoResult<Option<Application>>;

    /// Persists `application` only while the stored status is still `expected`.
    /// Returns `false` when the application moved on in the meantime.
    async fn update_application(&self, application: &Application, expected: BookingStatus) -> RepoResult<bool>;

    async fn list_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<Application>>;

    async fn list_for_walker(&self, walker_id: Uuid) -> RepoResult<Vec<Application>>;

    /// True when `walker_id` has a bid still in `WALKER_APPLIED` on any open
    /// request of `owner_id`.
    async fn has_open_bid(&self, owner_id: Uuid, walker_id: Uuid) -> RepoResult<bool>;
}

/// Append-only walk track storage.
#[async_trait]
pub trait TrackRepository: Send + Sync {
    async fn append_sample(&self, sample: &LocationSample) -> RepoResult<()>;

    /// All samples of a booking, oldest first.
    async fn list_samples(&self, booking_id: Uuid) -> RepoResult<Vec<LocationSample>>;

    /// Samples strictly after `since`, oldest first.
    async fn list_since(&self, booking_id: Uuid, since: DateTime<Utc>) -> RepoResult<Vec<LocationSample>>;

    /// Up to `limit` samples, newest first.
    async fn recent_samples(&self, booking_id: Uuid, limit: usize) -> RepoResult<Vec<LocationSample>>;

    async fn latest_sample(&self, booking_id: Uuid) -> RepoResult<Option<LocationSample>>;
}

#[async_trait]
pub trait ChangeRequestRepository: Send + Sync {
    async fn insert_change(&self, request: &BookingChangeRequest) -> RepoResult<()>;

    async fn get_change(&self, id: Uuid) -> RepoResult<Option<BookingChangeRequest>>;

    /// Newest first.
    async fn list_changes_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>>;

    async fn list_pending_by_requester(&self, user_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>>;

    async fn list_pending_for_owner(&self, owner_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>>;

    async fn list_pending_for_walker(&self, walker_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>>;

    /// Writes the decided request and, when approved, the changed booking as one
    /// unit. Returns `false` if the request was no longer pending or the booking
    /// version moved; nothing is written in that case.
    async fn resolve(&self, request: &BookingChangeRequest, booking: Option<&Booking>) -> RepoResult<bool>;
}

/// Ephemeral timestamp keys used to rate-limit walk notifications.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    async fn get(&self, key: &str) -> RepoResult<Option<DateTime<Utc>>>;

    /// Atomically stores `at` when the key is absent or holds a timestamp at
    /// least `min_gap` older than `at`. Returns whether the claim was taken.
    async fn set_if_newer(&self, key: &str, at: DateTime<Utc>, min_gap: Duration, ttl: Duration) -> RepoResult<bool>;

    /// Undoes a claim made by `set_if_newer` if nobody overwrote it since:
    /// restores `previous`, or deletes the key when there was none.
    async fn release(&self, key: &str, claimed: DateTime<Utc>, previous: Option<DateTime<Utc>>, ttl: Duration) -> RepoResult<()>;

    async fn delete(&self, key: &str) -> RepoResult<()>;

    async fn expire(&self, key: &str, ttl: Duration) -> RepoResult<()>;

    async fn push_history(&self, key: &str, entry: &str, ttl: Duration) -> RepoResult<()>;

    async fn history(&self, key: &str) -> RepoResult<Vec<String>>;
}

pub mod keys {
    use uuid::Uuid;

    pub fn progress(booking_id: Uuid) -> String {
        format!("walk:notification:last:{}", booking_id)
    }

    pub fn stationary(booking_id: Uuid) -> String {
        format!("walk:stationary:{}", booking_id)
    }

    pub fn history(booking_id: Uuid) -> String {
        format!("walk:notification:history:{}", booking_id)
    }
}
