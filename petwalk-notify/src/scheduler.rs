use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use petwalk_core::geo::haversine_m;
use petwalk_core::models::{Booking, BookingStatus, LocationSample};
use petwalk_core::repository::{keys, BookingRepository, CooldownStore, TrackRepository};
use petwalk_core::rules::WalkRules;
use petwalk_core::{Clock, CoreResult};
use petwalk_tracking::PathStatistics;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::messages::WalkMessage;
use crate::notifier::WalkNotifier;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub active_walks: usize,
    pub walk_booking_ids: Vec<Uuid>,
    pub last_progress_sweep: Option<DateTime<Utc>>,
    pub last_stationary_sweep: Option<DateTime<Utc>>,
    pub scheduler_enabled: bool,
}

enum Outcome {
    Sent,
    Skipped,
}

/// Time-driven progress and stationary alerts for walks in progress.
pub struct NotificationScheduler {
    bookings: Arc<dyn BookingRepository>,
    tracks: Arc<dyn TrackRepository>,
    notifier: Arc<WalkNotifier>,
    cooldowns: Arc<dyn CooldownStore>,
    clock: Arc<dyn Clock>,
    rules: WalkRules,
    enabled: AtomicBool,
    last_progress: Mutex<Option<DateTime<Utc>>>,
    last_stationary: Mutex<Option<DateTime<Utc>>>,
}

impl NotificationScheduler {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        tracks: Arc<dyn TrackRepository>,
        notifier: Arc<WalkNotifier>,
        cooldowns: Arc<dyn CooldownStore>,
        clock: Arc<dyn Clock>,
        rules: WalkRules,
    ) -> Self {
        Self {
            bookings,
            tracks,
            notifier,
            cooldowns,
            clock,
            rules,
            enabled: AtomicBool::new(false),
            last_progress: Mutex::new(None),
            last_stationary: Mutex::new(None),
        }
    }

    pub fn rules(&self) -> &WalkRules {
        &self.rules
    }

    /// Marks the periodic tasks as running; reported by `status`.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn ttl(&self) -> Duration {
        Duration::hours(self.rules.cooldown_ttl_hours)
    }

    /// One progress pass over all running walks.
    pub async fn progress_sweep(&self) -> CoreResult<SweepReport> {
        let now = self.clock.now();
        let walks = self.bookings.list_by_status(BookingStatus::InProgress).await?;
        let mut report = SweepReport::default();

        for booking in &walks {
            report.examined += 1;
            match self.progress_for(booking, now).await {
                Ok(Outcome::Sent) => report.sent += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(booking_id = %booking.id, error = %e, "Progress notification failed");
                }
            }
        }

        *self.last_progress.lock() = Some(now);
        info!(?report, "Progress sweep finished");
        Ok(report)
    }

    async fn progress_for(&self, booking: &Booking, now: DateTime<Utc>) -> CoreResult<Outcome> {
        let gap = Duration::minutes(self.rules.progress_cooldown_minutes);
        let samples = self.tracks.list_samples(booking.id).await?;
        let stats = PathStatistics::from_samples(&samples);
        let elapsed_minutes = booking
            .actual_start
            .map(|start| (now - start).num_minutes())
            .unwrap_or(stats.duration_minutes);
        let message = WalkMessage::Progress {
            pet_name: self.notifier.pet_name(booking).await,
            distance_km: stats.total_distance_km,
            elapsed_minutes,
            speed_kmh: samples.last().and_then(|s| s.speed),
        };

        self.send_gated(booking, &keys::progress(booking.id), now, gap, message)
            .await
    }

    /// One stationary-detection pass over all running walks.
    pub async fn stationary_sweep(&self) -> CoreResult<SweepReport> {
        let now = self.clock.now();
        let walks = self.bookings.list_by_status(BookingStatus::InProgress).await?;
        let mut report = SweepReport::default();

        for booking in &walks {
            report.examined += 1;
            match self.stationary_for(booking, now).await {
                Ok(Outcome::Sent) => report.sent += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(booking_id = %booking.id, error = %e, "Stationary check failed");
                }
            }
        }

        *self.last_stationary.lock() = Some(now);
        info!(?report, "Stationary sweep finished");
        Ok(report)
    }

    async fn stationary_for(&self, booking: &Booking, now: DateTime<Utc>) -> CoreResult<Outcome> {
        let since = now - Duration::minutes(self.rules.stationary_window_minutes);
        let window = self.tracks.list_since(booking.id, since).await?;
        if !self.is_stationary(&window) {
            return Ok(Outcome::Skipped);
        }

        let minutes = match (window.first(), window.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_minutes().max(1),
            _ => self.rules.stationary_window_minutes,
        };
        let message = WalkMessage::Stationary {
            pet_name: self.notifier.pet_name(booking).await,
            minutes,
        };
        let gap = Duration::minutes(self.rules.stationary_cooldown_minutes);
        self.send_gated(booking, &keys::stationary(booking.id), now, gap, message)
            .await
    }

    /// At least the minimum number of points, all within the radius of the first.
    pub fn is_stationary(&self, window: &[LocationSample]) -> bool {
        let Some(anchor) = window.first() else {
            return false;
        };
        window.len() >= self.rules.stationary_min_samples
            && window.iter().all(|s| {
                haversine_m(anchor.latitude, anchor.longitude, s.latitude, s.longitude)
                    <= self.rules.stationary_radius_m
            })
    }

    /// Claims the cooldown key, sends, and hands the claim back if the send failed.
    async fn send_gated(
        &self,
        booking: &Booking,
        key: &str,
        now: DateTime<Utc>,
        gap: Duration,
        message: WalkMessage,
    ) -> CoreResult<Outcome> {
        let previous = self.cooldowns.get(key).await?;
        if !self.cooldowns.set_if_newer(key, now, gap, self.ttl()).await? {
            debug!(booking_id = %booking.id, key, "Cooldown active, skipping");
            return Ok(Outcome::Skipped);
        }

        if let Err(e) = self.notifier.notify_owner(booking, message).await {
            if let Err(release_err) = self.cooldowns.release(key, now, previous, self.ttl()).await {
                error!(booking_id = %booking.id, error = %release_err, "Failed to release cooldown");
            }
            return Err(e);
        }
        Ok(Outcome::Sent)
    }

    pub async fn cleanup(&self, booking_id: Uuid) -> CoreResult<()> {
        self.notifier.cleanup(booking_id).await
    }

    pub async fn status(&self) -> CoreResult<SchedulerStatus> {
        let walks = self.bookings.list_by_status(BookingStatus::InProgress).await?;
        Ok(SchedulerStatus {
            active_walks: walks.len(),
            walk_booking_ids: walks.iter().map(|b| b.id).collect(),
            last_progress_sweep: *self.last_progress.lock(),
            last_stationary_sweep: *self.last_stationary.lock(),
            scheduler_enabled: self.enabled.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageComposer;
    use petwalk_core::clock::ManualClock;
    use petwalk_core::collaborators::RecordingDispatcher;
    use petwalk_core::memory::{MemoryCooldownStore, MemoryDirectory, MemoryRepository};
    use petwalk_core::models::{BookingMethod, SampleKind, UserProfile, WalkPhotos};

    struct Fixture {
        scheduler: NotificationScheduler,
        repo: Arc<MemoryRepository>,
        dispatcher: Arc<RecordingDispatcher>,
        cooldowns: Arc<MemoryCooldownStore>,
        clock: Arc<ManualClock>,
        booking: Booking,
    }

    async fn fixture(dispatcher: RecordingDispatcher) -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let repo = Arc::new(MemoryRepository::new());
        let directory = Arc::new(MemoryDirectory::new());
        let cooldowns = Arc::new(MemoryCooldownStore::new(clock.clone()));
        let dispatcher = Arc::new(dispatcher);

        let owner = UserProfile {
            id: Uuid::new_v4(),
            name: "Mina".into(),
            phone: Some("010-2222-3333".into()),
            email: None,
            emergency_contact: None,
        };
        let now = clock.now();
        let booking = Booking {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            walker_id: Some(Uuid::new_v4()),
            pet_id: Uuid::new_v4(),
            method: BookingMethod::WalkerSelection,
            status: BookingStatus::InProgress,
            date: now,
            duration_minutes: 60,
            total_price: 20000.0,
            pickup: None,
            dropoff: None,
            emergency_contact: None,
            insurance_covered: false,
            notes: Vec::new(),
            regular_package: false,
            package_frequency: None,
            actual_start: Some(now),
            actual_end: None,
            photos: WalkPhotos::default(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        directory.add_user(owner);
        repo.insert_booking(&booking).await.unwrap();

        let rules = WalkRules::default();
        let notifier = Arc::new(WalkNotifier::new(
            directory,
            dispatcher.clone(),
            MessageComposer::default(),
            cooldowns.clone(),
            clock.clone(),
            &rules,
        ));
        let scheduler = NotificationScheduler::new(
            repo.clone(),
            repo.clone(),
            notifier,
            cooldowns.clone(),
            clock.clone(),
            rules,
        );
        Fixture {
            scheduler,
            repo,
            dispatcher,
            cooldowns,
            clock,
            booking,
        }
    }

    async fn add_sample(f: &Fixture, lat: f64, lon: f64) {
        let sample = LocationSample {
            id: Uuid::new_v4(),
            booking_id: f.booking.id,
            latitude: lat,
            longitude: lon,
            timestamp: f.clock.now(),
            accuracy: None,
            speed: Some(0.2),
            altitude: None,
            kind: SampleKind::Walking,
        };
        f.repo.append_sample(&sample).await.unwrap();
    }

    #[tokio::test]
    async fn test_progress_respects_ten_minute_cooldown() {
        let f = fixture(RecordingDispatcher::default()).await;

        let first = f.scheduler.progress_sweep().await.unwrap();
        assert_eq!(first.sent, 1);

        f.clock.advance(Duration::minutes(5));
        let second = f.scheduler.progress_sweep().await.unwrap();
        assert_eq!(second.sent, 0);
        assert_eq!(second.skipped, 1);

        f.clock.advance(Duration::minutes(5));
        assert_eq!(f.scheduler.progress_sweep().await.unwrap().sent, 1);
        assert_eq!(f.dispatcher.count_kind("PROGRESS"), 2);
    }

    #[tokio::test]
    async fn test_failed_send_does_not_start_cooldown() {
        let f = fixture(RecordingDispatcher::failing()).await;
        let report = f.scheduler.progress_sweep().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(f.cooldowns.get(&keys::progress(f.booking.id)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stationary_alert_once_per_cooldown() {
        let f = fixture(RecordingDispatcher::default()).await;
        for _ in 0..4 {
            add_sample(&f, 37.50000, 127.00000).await;
            f.clock.advance(Duration::minutes(1));
        }

        assert_eq!(f.scheduler.stationary_sweep().await.unwrap().sent, 1);
        assert_eq!(f.scheduler.stationary_sweep().await.unwrap().sent, 0);
        assert_eq!(f.dispatcher.count_kind("STATIONARY"), 1);

        // Still parked half an hour later
        f.clock.advance(Duration::minutes(30));
        for _ in 0..3 {
            add_sample(&f, 37.50001, 127.00001).await;
            f.clock.advance(Duration::seconds(30));
        }
        assert_eq!(f.scheduler.stationary_sweep().await.unwrap().sent, 1);
        assert_eq!(f.dispatcher.count_kind("STATIONARY"), 2);
    }

    #[tokio::test]
    async fn test_moving_walk_is_not_stationary() {
        let f = fixture(RecordingDispatcher::default()).await;
        for i in 0..4 {
            add_sample(&f, 37.500 + 0.001 * i as f64, 127.0).await;
            f.clock.advance(Duration::minutes(1));
        }
        assert_eq!(f.scheduler.stationary_sweep().await.unwrap().sent, 0);
    }

    #[tokio::test]
    async fn test_status_lists_running_walks() {
        let f = fixture(RecordingDispatcher::default()).await;
        let before = f.scheduler.status().await.unwrap();
        assert_eq!(before.active_walks, 1);
        assert_eq!(before.walk_booking_ids, vec![f.booking.id]);
        assert!(before.last_progress_sweep.is_none());

        f.scheduler.set_enabled(true);
        f.scheduler.progress_sweep().await.unwrap();
        let after = f.scheduler.status().await.unwrap();
        assert!(after.scheduler_enabled);
        assert_eq!(after.last_progress_sweep, Some(f.clock.now()));
    }

    #[tokio::test]
    async fn test_cleanup_resets_cooldowns() {
        let f = fixture(RecordingDispatcher::default()).await;
        f.scheduler.progress_sweep().await.unwrap();
        f.scheduler.cleanup(f.booking.id).await.unwrap();
        assert_eq!(f.cooldowns.get(&keys::progress(f.booking.id)).await.unwrap(), None);
        assert_eq!(f.scheduler.progress_sweep().await.unwrap().sent, 1);
    }
}
