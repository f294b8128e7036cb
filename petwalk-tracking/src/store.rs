use chrono::{DateTime, Utc};
use petwalk_core::access::{require_party, require_walker};
use petwalk_core::collaborators::{LiveBroadcast, WalkerDirectory};
use petwalk_core::models::{Booking, BookingStatus, LocationSample, SampleKind};
use petwalk_core::repository::{BookingRepository, TrackRepository};
use petwalk_core::{Clock, CoreError, CoreResult};
use petwalk_shared::models::LiveEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::guard::LocationGuard;
use crate::stats::PathStatistics;

/// Inbound track point as sent by the walker's device.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSample {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub altitude: Option<f64>,
    pub kind: Option<SampleKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WalkPath {
    pub booking_id: Uuid,
    pub samples: Vec<LocationSample>,
    pub statistics: PathStatistics,
}

pub struct TrackStore {
    bookings: Arc<dyn BookingRepository>,
    walkers: Arc<dyn WalkerDirectory>,
    tracks: Arc<dyn TrackRepository>,
    guard: LocationGuard,
    live: Arc<dyn LiveBroadcast>,
    clock: Arc<dyn Clock>,
}

impl TrackStore {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        walkers: Arc<dyn WalkerDirectory>,
        tracks: Arc<dyn TrackRepository>,
        guard: LocationGuard,
        live: Arc<dyn LiveBroadcast>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            walkers,
            tracks,
            guard,
            live,
            clock,
        }
    }

    async fn load(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))
    }

    /// Validates and stores a point for a walk in progress.
    pub async fn append(&self, booking_id: Uuid, actor: Uuid, input: NewSample) -> CoreResult<LocationSample> {
        // 1. Access: only the assigned walker of a running walk
        let booking = self.load(booking_id).await?;
        require_walker(&booking, actor, self.walkers.as_ref()).await?;
        if booking.status != BookingStatus::InProgress {
            return Err(CoreError::InvalidState(format!(
                "booking {} is {}, tracking needs IN_PROGRESS",
                booking_id, booking.status
            )));
        }

        // 2. Plausibility, measured on the server clock
        let now = self.clock.now();
        let (latitude, longitude) = self
            .guard
            .inspect(booking_id, input.latitude, input.longitude, now)
            .await?;
        let at = self.sample_time(booking_id, input.timestamp, now).await?;

        // 3. Persist
        let sample = LocationSample {
            id: Uuid::new_v4(),
            booking_id,
            latitude,
            longitude,
            timestamp: at,
            accuracy: input.accuracy,
            speed: input.speed,
            altitude: input.altitude,
            kind: input.kind.unwrap_or_default(),
        };
        self.tracks.append_sample(&sample).await?;
        debug!(%booking_id, lat = latitude, lon = longitude, "Track point stored");

        // 4. Fan out to live viewers
        let event = LiveEvent::LocationUpdated {
            booking_id,
            sample_id: sample.id,
            latitude,
            longitude,
            speed: sample.speed,
            timestamp: at,
        };
        if let Err(e) = self.live.publish(event) {
            warn!(%booking_id, error = %e, "Live location publish failed");
        }

        Ok(sample)
    }

    /// Device time is kept only when it lies between the latest stored point
    /// and now. Anything else is replaced by the server time.
    async fn sample_time(
        &self,
        booking_id: Uuid,
        claimed: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CoreResult<DateTime<Utc>> {
        let Some(claimed) = claimed else {
            return Ok(now);
        };
        if claimed > now {
            warn!(%booking_id, %claimed, "Track point dated in the future, using server time");
            return Ok(now);
        }
        match self.tracks.latest_sample(booking_id).await? {
            Some(last) if claimed < last.timestamp => {
                warn!(%booking_id, %claimed, "Track point older than the latest, using server time");
                Ok(now)
            }
            _ => Ok(claimed),
        }
    }

    pub async fn update_current_location(
        &self,
        booking_id: Uuid,
        actor: Uuid,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> CoreResult<LocationSample> {
        let input = NewSample {
            latitude,
            longitude,
            timestamp: Some(self.clock.now()),
            kind: Some(SampleKind::Walking),
            ..Default::default()
        };
        self.append(booking_id, actor, input).await
    }

    pub async fn path(&self, booking_id: Uuid, actor: Uuid) -> CoreResult<WalkPath> {
        let booking = self.load(booking_id).await?;
        require_party(&booking, actor, self.walkers.as_ref()).await?;
        let samples = self.tracks.list_samples(booking_id).await?;
        let statistics = PathStatistics::from_samples(&samples);
        Ok(WalkPath {
            booking_id,
            samples,
            statistics,
        })
    }

    pub async fn recent(&self, booking_id: Uuid, actor: Uuid, since: DateTime<Utc>) -> CoreResult<Vec<LocationSample>> {
        let booking = self.load(booking_id).await?;
        require_party(&booking, actor, self.walkers.as_ref()).await?;
        Ok(self.tracks.list_since(booking_id, since).await?)
    }

    pub async fn latest(&self, booking_id: Uuid) -> CoreResult<Option<LocationSample>> {
        Ok(self.tracks.latest_sample(booking_id).await?)
    }

    /// Statistics without access checks, for internal consumers.
    pub async fn statistics(&self, booking_id: Uuid) -> CoreResult<PathStatistics> {
        let samples = self.tracks.list_samples(booking_id).await?;
        Ok(PathStatistics::from_samples(&samples))
    }
}
