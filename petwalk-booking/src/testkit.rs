use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use petwalk_core::clock::ManualClock;
use petwalk_core::collaborators::{MockChatRooms, RecordingBroadcast, RecordingDispatcher};
use petwalk_core::memory::{MemoryCooldownStore, MemoryDirectory, MemoryRepository};
use petwalk_core::models::{
    Application, Booking, BookingStatus, LocationSample, Place, UserProfile, WalkerProfile, WalkerStatus,
};
use petwalk_core::repository::{ApplicationRepository, BookingRepository, RepoResult, TrackRepository};
use petwalk_core::rules::WalkRules;
use petwalk_notify::{MessageComposer, WalkNotifier};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::changes::ChangeNegotiator;
use crate::manager::{BookingService, BookingServiceDeps};
use crate::models::CreateBookingRequest;
use crate::orchestrator::ConfirmationOrchestrator;

/// A competing write that lands just before the next booking write.
pub enum Interleave {
    SetStatus(BookingStatus),
    Withdraw(Uuid),
}

/// Memory tables with storage faults switched on per test.
pub struct FaultyRepository {
    inner: Arc<MemoryRepository>,
    lost_writes: AtomicUsize,
    booking_writes: AtomicUsize,
    fail_application_writes: AtomicBool,
    fail_track_reads: AtomicBool,
    interleave: Mutex<Option<Interleave>>,
}

impl FaultyRepository {
    fn new(inner: Arc<MemoryRepository>) -> Self {
        Self {
            inner,
            lost_writes: AtomicUsize::new(0),
            booking_writes: AtomicUsize::new(0),
            fail_application_writes: AtomicBool::new(false),
            fail_track_reads: AtomicBool::new(false),
            interleave: Mutex::new(None),
        }
    }

    /// The next `n` booking writes report a lost version race.
    pub fn lose_writes(&self, n: usize) {
        self.lost_writes.store(n, Ordering::SeqCst);
    }

    pub fn booking_writes(&self) -> usize {
        self.booking_writes.load(Ordering::SeqCst)
    }

    pub fn fail_application_writes(&self) {
        self.fail_application_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_track_reads(&self) {
        self.fail_track_reads.store(true, Ordering::SeqCst);
    }

    pub fn interleave(&self, step: Interleave) {
        *self.interleave.lock() = Some(step);
    }

    async fn run_interleaved(&self, booking_id: Uuid, step: Interleave) -> RepoResult<()> {
        match step {
            Interleave::SetStatus(status) => {
                if let Some(mut stored) = self.inner.get_booking(booking_id).await? {
                    stored.status = status;
                    self.inner.update_booking(&stored).await?;
                }
            }
            Interleave::Withdraw(application_id) => {
                if let Some(mut stored) = self.inner.get_application(application_id).await? {
                    stored.status = BookingStatus::Cancelled;
                    self.inner
                        .update_application(&stored, BookingStatus::WalkerApplied)
                        .await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for FaultyRepository {
    async fn insert_booking(&self, booking: &Booking) -> RepoResult<()> {
        self.inner.insert_booking(booking).await
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        self.inner.get_booking(id).await
    }

    async fn update_booking(&self, booking: &Booking) -> RepoResult<bool> {
        self.booking_writes.fetch_add(1, Ordering::SeqCst);
        let step = self.interleave.lock().take();
        if let Some(step) = step {
            self.run_interleaved(booking.id, step).await?;
        }
        let lost = self
            .lost_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return Ok(false);
        }
        self.inner.update_booking(booking).await
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Booking>> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn list_by_walker(&self, walker_id: Uuid) -> RepoResult<Vec<Booking>> {
        self.inner.list_by_walker(walker_id).await
    }

    async fn list_by_status(&self, status: BookingStatus) -> RepoResult<Vec<Booking>> {
        self.inner.list_by_status(status).await
    }

    async fn list_open_requests(&self) -> RepoResult<Vec<Booking>> {
        self.inner.list_open_requests().await
    }
}

#[async_trait]
impl ApplicationRepository for FaultyRepository {
    async fn insert_application(&self, application: &Application) -> RepoResult<()> {
        self.inner.insert_application(application).await
    }

    async fn get_application(&self, id: Uuid) -> RepoResult<Option<Application>> {
        self.inner.get_application(id).await
    }

    async fn update_application(&self, application: &Application, expected: BookingStatus) -> RepoResult<bool> {
        if self.fail_application_writes.load(Ordering::SeqCst) {
            return Err("application table unavailable".into());
        }
        self.inner.update_application(application, expected).await
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<Application>> {
        self.inner.list_for_booking(booking_id).await
    }

    async fn list_for_walker(&self, walker_id: Uuid) -> RepoResult<Vec<Application>> {
        self.inner.list_for_walker(walker_id).await
    }

    async fn has_open_bid(&self, owner_id: Uuid, walker_id: Uuid) -> RepoResult<bool> {
        self.inner.has_open_bid(owner_id, walker_id).await
    }
}

#[async_trait]
impl TrackRepository for FaultyRepository {
    async fn append_sample(&self, sample: &LocationSample) -> RepoResult<()> {
        self.inner.append_sample(sample).await
    }

    async fn list_samples(&self, booking_id: Uuid) -> RepoResult<Vec<LocationSample>> {
        if self.fail_track_reads.load(Ordering::SeqCst) {
            return Err("track table unavailable".into());
        }
        self.inner.list_samples(booking_id).await
    }

    async fn list_since(&self, booking_id: Uuid, since: DateTime<Utc>) -> RepoResult<Vec<LocationSample>> {
        self.inner.list_since(booking_id, since).await
    }

    async fn recent_samples(&self, booking_id: Uuid, limit: usize) -> RepoResult<Vec<LocationSample>> {
        self.inner.recent_samples(booking_id, limit).await
    }

    async fn latest_sample(&self, booking_id: Uuid) -> RepoResult<Option<LocationSample>> {
        self.inner.latest_sample(booking_id).await
    }
}

pub struct Harness {
    pub service: BookingService,
    pub changes: ChangeNegotiator,
    pub repo: Arc<MemoryRepository>,
    pub faults: Arc<FaultyRepository>,
    pub directory: Arc<MemoryDirectory>,
    pub notifier: Arc<WalkNotifier>,
    pub cooldowns: Arc<MemoryCooldownStore>,
    pub chat: Arc<MockChatRooms>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub live: Arc<RecordingBroadcast>,
    pub clock: Arc<ManualClock>,
    pub owner: UserProfile,
    pub walker: WalkerProfile,
    pub walker_user: UserProfile,
    pub second_walker: WalkerProfile,
    pub inactive_walker: WalkerProfile,
    pub pet_id: Uuid,
}

fn walker(status: WalkerStatus, user_id: Uuid, rate: Option<f64>) -> WalkerProfile {
    WalkerProfile {
        id: Uuid::new_v4(),
        user_id,
        name: "Joon".into(),
        status,
        hourly_rate: rate,
        phone: Some("010-9999-0000".into()),
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(MockChatRooms::default(), RecordingDispatcher::default())
    }

    pub async fn with_failing_collaborators() -> Self {
        Self::build(MockChatRooms::failing(), RecordingDispatcher::failing())
    }

    fn build(chat: MockChatRooms, dispatcher: RecordingDispatcher) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let repo = Arc::new(MemoryRepository::new());
        let faults = Arc::new(FaultyRepository::new(repo.clone()));
        let directory = Arc::new(MemoryDirectory::new());
        let cooldowns = Arc::new(MemoryCooldownStore::new(clock.clone()));
        let chat = Arc::new(chat);
        let dispatcher = Arc::new(dispatcher);
        let live = Arc::new(RecordingBroadcast::default());
        let rules = WalkRules::default();

        let owner = UserProfile {
            id: Uuid::new_v4(),
            name: "Mina".into(),
            phone: Some("010-1234-5678".into()),
            email: None,
            emergency_contact: Some("010-5555-0000".into()),
        };
        let walker_user = UserProfile {
            id: Uuid::new_v4(),
            name: "Joon".into(),
            phone: Some("010-9999-0000".into()),
            email: None,
            emergency_contact: None,
        };
        let main_walker = walker(WalkerStatus::Active, walker_user.id, Some(24000.0));
        let second_walker = walker(WalkerStatus::Active, Uuid::new_v4(), None);
        let inactive_walker = walker(WalkerStatus::Inactive, Uuid::new_v4(), None);
        let pet_id = Uuid::new_v4();

        directory.add_user(owner.clone());
        directory.add_user(walker_user.clone());
        directory.add_walker(main_walker.clone());
        directory.add_walker(second_walker.clone());
        directory.add_walker(inactive_walker.clone());
        directory.add_pet(pet_id, "Bori");

        let notifier = Arc::new(WalkNotifier::new(
            directory.clone(),
            dispatcher.clone(),
            MessageComposer::default(),
            cooldowns.clone(),
            clock.clone(),
            &rules,
        ));
        let service = BookingService::new(BookingServiceDeps {
            bookings: faults.clone(),
            applications: faults.clone(),
            tracks: faults.clone(),
            users: directory.clone(),
            walkers: directory.clone(),
            notifier: notifier.clone(),
            confirmations: ConfirmationOrchestrator::new(chat.clone(), notifier.clone()),
            live: live.clone(),
            clock: clock.clone(),
            rules,
        });
        let changes = ChangeNegotiator::new(repo.clone(), repo.clone(), directory.clone(), clock.clone());

        Self {
            service,
            changes,
            repo,
            faults,
            directory,
            notifier,
            cooldowns,
            chat,
            dispatcher,
            live,
            clock,
            owner,
            walker: main_walker,
            walker_user,
            second_walker,
            inactive_walker,
            pet_id,
        }
    }

    pub fn direct_request(&self) -> CreateBookingRequest {
        CreateBookingRequest {
            walker_id: Some(self.walker.id),
            pet_id: self.pet_id,
            date: self.clock_now() + Duration::days(1),
            duration_minutes: 90,
            pickup: Some(Place {
                location: "Apartment lobby".into(),
                address: "12 River Rd".into(),
            }),
            dropoff: None,
            emergency_contact: None,
            insurance_covered: true,
            notes: Some("Bori pulls on the leash".into()),
            regular_package: false,
            package_frequency: None,
        }
    }

    pub fn open_request(&self) -> CreateBookingRequest {
        CreateBookingRequest {
            walker_id: None,
            duration_minutes: 60,
            notes: None,
            ..self.direct_request()
        }
    }

    fn clock_now(&self) -> chrono::DateTime<Utc> {
        use petwalk_core::Clock;
        self.clock.now()
    }
}
