//! In-process implementations of the repository and directory traits,
//! backing the unit and router test suites.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::collaborators::{CollabResult, UserDirectory, WalkerDirectory};
use crate::models::{
    Application, Booking, BookingChangeRequest, BookingStatus, ChangeStatus, LocationSample,
    UserProfile, WalkerProfile,
};
use crate::repository::{
    ApplicationRepository, BookingRepository, ChangeRequestRepository, CooldownStore, RepoResult,
    TrackRepository,
};

#[derive(Default)]
struct Tables {
    bookings: HashMap<Uuid, Booking>,
    applications: HashMap<Uuid, Application>,
    samples: HashMap<Uuid, Vec<LocationSample>>,
    changes: HashMap<Uuid, BookingChangeRequest>,
}

/// All tables behind one lock, so multi-row writes are atomic.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_created(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    bookings
}

#[async_trait]
impl BookingRepository for MemoryRepository {
    async fn insert_booking(&self, booking: &Booking) -> RepoResult<()> {
        let mut tables = self.tables.lock();
        if tables.bookings.contains_key(&booking.id) {
            return Err(format!("booking {} already exists", booking.id).into());
        }
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        Ok(self.tables.lock().bookings.get(&id).cloned())
    }

    async fn update_booking(&self, booking: &Booking) -> RepoResult<bool> {
        let mut tables = self.tables.lock();
        Ok(compare_and_store(&mut tables, booking))
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Booking>> {
        let tables = self.tables.lock();
        Ok(sorted_by_created(
            tables.bookings.values().filter(|b| b.owner_id == owner_id).cloned().collect(),
        ))
    }

    async fn list_by_walker(&self, walker_id: Uuid) -> RepoResult<Vec<Booking>> {
        let tables = self.tables.lock();
        Ok(sorted_by_created(
            tables
                .bookings
                .values()
                .filter(|b| b.walker_id == Some(walker_id))
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_status(&self, status: BookingStatus) -> RepoResult<Vec<Booking>> {
        let tables = self.tables.lock();
        Ok(sorted_by_created(
            tables.bookings.values().filter(|b| b.status == status).cloned().collect(),
        ))
    }

    async fn list_open_requests(&self) -> RepoResult<Vec<Booking>> {
        let tables = self.tables.lock();
        Ok(sorted_by_created(
            tables
                .bookings
                .values()
                .filter(|b| b.is_open_request() && b.status == BookingStatus::Pending)
                .cloned()
                .collect(),
        ))
    }
}

fn compare_and_store(tables: &mut Tables, booking: &Booking) -> bool {
    match tables.bookings.get_mut(&booking.id) {
        Some(stored) if stored.version == booking.version => {
            let mut next = booking.clone();
            next.version += 1;
            *stored = next;
            true
        }
        _ => false,
    }
}

#[async_trait]
impl ApplicationRepository for MemoryRepository {
    async fn insert_application(&self, application: &Application) -> RepoResult<()> {
        self.tables
            .lock()
            .applications
            .insert(application.id, application.clone());
        Ok(())
    }

    async fn get_application(&self, id: Uuid) -> RepoResult<Option<Application>> {
        Ok(self.tables.lock().applications.get(&id).cloned())
    }

    async fn update_application(&self, application: &Application, expected: BookingStatus) -> RepoResult<bool> {
        let mut tables = self.tables.lock();
        match tables.applications.get_mut(&application.id) {
            Some(stored) if stored.status == expected => {
                *stored = application.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(format!("application {} not found", application.id).into()),
        }
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<Application>> {
        let tables = self.tables.lock();
        let mut apps: Vec<_> = tables
            .applications
            .values()
            .filter(|a| a.booking_id == booking_id)
            .cloned()
            .collect();
        apps.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(apps)
    }

    async fn list_for_walker(&self, walker_id: Uuid) -> RepoResult<Vec<Application>> {
        let tables = self.tables.lock();
        let mut apps: Vec<_> = tables
            .applications
            .values()
            .filter(|a| a.walker_id == walker_id)
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apps)
    }

    async fn has_open_bid(&self, owner_id: Uuid, walker_id: Uuid) -> RepoResult<bool> {
        let tables = self.tables.lock();
        Ok(tables.applications.values().any(|a| {
            a.walker_id == walker_id
                && a.status == BookingStatus::WalkerApplied
                && tables
                    .bookings
                    .get(&a.booking_id)
                    .map(|b| b.owner_id == owner_id)
                    .unwrap_or(false)
        }))
    }
}

#[async_trait]
impl TrackRepository for MemoryRepository {
    async fn append_sample(&self, sample: &LocationSample) -> RepoResult<()> {
        let mut tables = self.tables.lock();
        let track = tables.samples.entry(sample.booking_id).or_default();
        track.push(sample.clone());
        track.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(())
    }

    async fn list_samples(&self, booking_id: Uuid) -> RepoResult<Vec<LocationSample>> {
        Ok(self
            .tables
            .lock()
            .samples
            .get(&booking_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_since(&self, booking_id: Uuid, since: DateTime<Utc>) -> RepoResult<Vec<LocationSample>> {
        let tables = self.tables.lock();
        Ok(tables
            .samples
            .get(&booking_id)
            .map(|track| track.iter().filter(|s| s.timestamp > since).cloned().collect())
            .unwrap_or_default())
    }

    async fn recent_samples(&self, booking_id: Uuid, limit: usize) -> RepoResult<Vec<LocationSample>> {
        let tables = self.tables.lock();
        Ok(tables
            .samples
            .get(&booking_id)
            .map(|track| track.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn latest_sample(&self, booking_id: Uuid) -> RepoResult<Option<LocationSample>> {
        let tables = self.tables.lock();
        Ok(tables.samples.get(&booking_id).and_then(|track| track.last().cloned()))
    }
}

#[async_trait]
impl ChangeRequestRepository for MemoryRepository {
    async fn insert_change(&self, request: &BookingChangeRequest) -> RepoResult<()> {
        self.tables.lock().changes.insert(request.id, request.clone());
        Ok(())
    }

    async fn get_change(&self, id: Uuid) -> RepoResult<Option<BookingChangeRequest>> {
        Ok(self.tables.lock().changes.get(&id).cloned())
    }

    async fn list_changes_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>> {
        let tables = self.tables.lock();
        let mut changes: Vec<_> = tables
            .changes
            .values()
            .filter(|c| c.booking_id == booking_id)
            .cloned()
            .collect();
        changes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(changes)
    }

    async fn list_pending_by_requester(&self, user_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>> {
        let tables = self.tables.lock();
        Ok(tables
            .changes
            .values()
            .filter(|c| c.status == ChangeStatus::Pending && c.requested_by == user_id)
            .cloned()
            .collect())
    }

    async fn list_pending_for_owner(&self, owner_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>> {
        let tables = self.tables.lock();
        Ok(pending_where(&tables, |b| b.owner_id == owner_id))
    }

    async fn list_pending_for_walker(&self, walker_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>> {
        let tables = self.tables.lock();
        Ok(pending_where(&tables, |b| b.walker_id == Some(walker_id)))
    }

    async fn resolve(&self, request: &BookingChangeRequest, booking: Option<&Booking>) -> RepoResult<bool> {
        let mut tables = self.tables.lock();
        let still_pending = tables
            .changes
            .get(&request.id)
            .map(|c| c.status == ChangeStatus::Pending)
            .unwrap_or(false);
        if !still_pending {
            return Ok(false);
        }
        if let Some(booking) = booking {
            if !compare_and_store(&mut tables, booking) {
                return Ok(false);
            }
        }
        tables.changes.insert(request.id, request.clone());
        Ok(true)
    }
}

fn pending_where(tables: &Tables, matches: impl Fn(&Booking) -> bool) -> Vec<BookingChangeRequest> {
    tables
        .changes
        .values()
        .filter(|c| c.status == ChangeStatus::Pending)
        .filter(|c| tables.bookings.get(&c.booking_id).map(&matches).unwrap_or(false))
        .cloned()
        .collect()
}

/// User and walker profiles registered up front.
#[derive(Default)]
pub struct MemoryDirectory {
    users: Mutex<HashMap<Uuid, UserProfile>>,
    walkers: Mutex<HashMap<Uuid, WalkerProfile>>,
    pets: Mutex<HashMap<Uuid, String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: UserProfile) {
        self.users.lock().insert(user.id, user);
    }

    pub fn add_walker(&self, walker: WalkerProfile) {
        self.walkers.lock().insert(walker.id, walker);
    }

    pub fn add_pet(&self, pet_id: Uuid, name: impl Into<String>) {
        self.pets.lock().insert(pet_id, name.into());
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn get_user(&self, id: Uuid) -> CollabResult<Option<UserProfile>> {
        Ok(self.users.lock().get(&id).cloned())
    }

    async fn pet_name(&self, pet_id: Uuid) -> CollabResult<Option<String>> {
        Ok(self.pets.lock().get(&pet_id).cloned())
    }
}

#[async_trait]
impl WalkerDirectory for MemoryDirectory {
    async fn get_walker(&self, id: Uuid) -> CollabResult<Option<WalkerProfile>> {
        Ok(self.walkers.lock().get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> CollabResult<Option<WalkerProfile>> {
        Ok(self
            .walkers
            .lock()
            .values()
            .find(|w| w.user_id == user_id)
            .cloned())
    }
}

struct Expiring<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

/// Cooldown store with expiry evaluated against an injected clock.
pub struct MemoryCooldownStore {
    clock: Arc<dyn Clock>,
    stamps: Mutex<HashMap<String, Expiring<DateTime<Utc>>>>,
    lists: Mutex<HashMap<String, Expiring<Vec<String>>>>,
}

impl MemoryCooldownStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            stamps: Mutex::new(HashMap::new()),
            lists: Mutex::new(HashMap::new()),
        }
    }

    fn live_stamp(&self, stamps: &mut HashMap<String, Expiring<DateTime<Utc>>>, key: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        match stamps.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value),
            Some(_) => {
                stamps.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl CooldownStore for MemoryCooldownStore {
    async fn get(&self, key: &str) -> RepoResult<Option<DateTime<Utc>>> {
        let mut stamps = self.stamps.lock();
        Ok(self.live_stamp(&mut stamps, key))
    }

    async fn set_if_newer(&self, key: &str, at: DateTime<Utc>, min_gap: Duration, ttl: Duration) -> RepoResult<bool> {
        let mut stamps = self.stamps.lock();
        if let Some(current) = self.live_stamp(&mut stamps, key) {
            if at - current < min_gap {
                return Ok(false);
            }
        }
        stamps.insert(
            key.to_string(),
            Expiring {
                value: at,
                expires_at: self.clock.now() + ttl,
            },
        );
        Ok(true)
    }

    async fn release(
        &self,
        key: &str,
        claimed: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
        ttl: Duration,
    ) -> RepoResult<()> {
        let mut stamps = self.stamps.lock();
        if self.live_stamp(&mut stamps, key) != Some(claimed) {
            return Ok(());
        }
        match previous {
            Some(value) => {
                stamps.insert(
                    key.to_string(),
                    Expiring {
                        value,
                        expires_at: self.clock.now() + ttl,
                    },
                );
            }
            None => {
                stamps.remove(key);
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> RepoResult<()> {
        self.stamps.lock().remove(key);
        self.lists.lock().remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> RepoResult<()> {
        let expires_at = self.clock.now() + ttl;
        if let Some(entry) = self.stamps.lock().get_mut(key) {
            entry.expires_at = expires_at;
        }
        if let Some(entry) = self.lists.lock().get_mut(key) {
            entry.expires_at = expires_at;
        }
        Ok(())
    }

    async fn push_history(&self, key: &str, entry: &str, ttl: Duration) -> RepoResult<()> {
        let now = self.clock.now();
        let mut lists = self.lists.lock();
        let list = lists.entry(key.to_string()).or_insert_with(|| Expiring {
            value: Vec::new(),
            expires_at: now + ttl,
        });
        if list.expires_at <= now {
            list.value.clear();
        }
        list.value.push(entry.to_string());
        list.expires_at = now + ttl;
        Ok(())
    }

    async fn history(&self, key: &str) -> RepoResult<Vec<String>> {
        let now = self.clock.now();
        let lists = self.lists.lock();
        Ok(lists
            .get(key)
            .filter(|l| l.expires_at > now)
            .map(|l| l.value.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{BookingMethod, WalkPhotos};

    fn booking(owner_id: Uuid) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            owner_id,
            walker_id: None,
            pet_id: Uuid::new_v4(),
            method: BookingMethod::OpenRequest,
            status: BookingStatus::Pending,
            date: now,
            duration_minutes: 30,
            total_price: 10000.0,
            pickup: None,
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

    #[tokio::test]
    async fn test_update_booking_is_version_checked() {
        let repo = MemoryRepository::new();
        let b = booking(Uuid::new_v4());
        repo.insert_booking(&b).await.unwrap();

        let mut first = b.clone();
        first.total_price = 1.0;
        assert!(repo.update_booking(&first).await.unwrap());

        // Stale copy still carries version 0
        let mut stale = b.clone();
        stale.total_price = 2.0;
        assert!(!repo.update_booking(&stale).await.unwrap());

        let stored = repo.get_booking(b.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.total_price, 1.0);
    }

    #[tokio::test]
    async fn test_open_bid_is_scoped_to_owner() {
        let repo = MemoryRepository::new();
        let owner = Uuid::new_v4();
        let walker = Uuid::new_v4();
        let b = booking(owner);
        repo.insert_booking(&b).await.unwrap();
        let app = Application::new(b.id, walker, None, None, Utc::now()).unwrap();
        repo.insert_application(&app).await.unwrap();

        assert!(repo.has_open_bid(owner, walker).await.unwrap());
        assert!(!repo.has_open_bid(Uuid::new_v4(), walker).await.unwrap());
    }

    #[tokio::test]
    async fn test_cooldown_set_if_newer_and_ttl() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let store = MemoryCooldownStore::new(clock.clone());
        let gap = Duration::minutes(10);
        let ttl = Duration::hours(24);

        assert!(store.set_if_newer("k", start, gap, ttl).await.unwrap());
        assert!(!store
            .set_if_newer("k", start + Duration::minutes(9), gap, ttl)
            .await
            .unwrap());
        assert!(store
            .set_if_newer("k", start + Duration::minutes(10), gap, ttl)
            .await
            .unwrap());

        clock.advance(Duration::hours(25));
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_release_restores_previous_claim() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let store = MemoryCooldownStore::new(clock);
        let ttl = Duration::hours(24);

        assert!(store.set_if_newer("k", start, Duration::zero(), ttl).await.unwrap());
        store.release("k", start, None, ttl).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        let later = start + Duration::minutes(30);
        store.set_if_newer("k", start, Duration::zero(), ttl).await.unwrap();
        store.set_if_newer("k", later, Duration::zero(), ttl).await.unwrap();
        store.release("k", later, Some(start), ttl).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(start));
    }

    #[tokio::test]
    async fn test_history_expires() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = MemoryCooldownStore::new(clock.clone());
        store.push_history("h", "PROGRESS", Duration::hours(24)).await.unwrap();
        store.push_history("h", "STATIONARY", Duration::hours(24)).await.unwrap();
        assert_eq!(store.history("h").await.unwrap().len(), 2);

        clock.advance(Duration::hours(24));
        assert!(store.history("h").await.unwrap().is_empty());
    }
}
