use chrono::{DateTime, Utc};
use petwalk_core::geo;
use petwalk_core::repository::TrackRepository;
use petwalk_core::rules::WalkRules;
use petwalk_core::{CoreError, CoreResult};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Plausibility checks applied to every incoming track point.
pub struct LocationGuard {
    tracks: Arc<dyn TrackRepository>,
    rules: WalkRules,
}

impl LocationGuard {
    pub fn new(tracks: Arc<dyn TrackRepository>, rules: WalkRules) -> Self {
        Self { tracks, rules }
    }

    pub fn validate_coordinates(lat: Option<f64>, lon: Option<f64>) -> CoreResult<(f64, f64)> {
        let lat = lat.ok_or_else(|| CoreError::LocationRequired("latitude is required".into()))?;
        let lon = lon.ok_or_else(|| CoreError::LocationRequired("longitude is required".into()))?;
        if !geo::is_valid_coordinate(lat, lon) {
            return Err(CoreError::InvalidCoordinates { lat, lon });
        }
        Ok((lat, lon))
    }

    /// Returns `false` (and logs) when the point is outside the service region.
    pub fn check_region(&self, booking_id: Uuid, lat: f64, lon: f64) -> bool {
        match self.rules.region {
            Some(region) if !region.contains(lat, lon) => {
                warn!(%booking_id, lat, lon, "Location outside service region");
                false
            }
            _ => true,
        }
    }

    /// Rejects a point that implies travelling faster than the configured limit
    /// since the latest stored sample. `now` is the server receive time; stored
    /// samples never carry a later timestamp. Returns the implied speed when one
    /// could be computed.
    pub async fn check_speed(
        &self,
        booking_id: Uuid,
        lat: f64,
        lon: f64,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<f64>> {
        let Some(last) = self.tracks.latest_sample(booking_id).await? else {
            return Ok(None);
        };

        let elapsed = (now - last.timestamp).num_milliseconds() as f64 / 1000.0;
        let distance = geo::haversine_km(last.latitude, last.longitude, lat, lon);
        let Some(speed_kmh) = geo::speed_kmh(distance, elapsed) else {
            return Ok(None);
        };

        if speed_kmh > self.rules.max_speed_kmh {
            warn!(%booking_id, speed_kmh, "Unrealistic location change");
            return Err(CoreError::UnrealisticLocationChange { speed_kmh });
        }
        Ok(Some(speed_kmh))
    }

    /// Heuristic for a frozen or replayed GPS feed: the last few stored points
    /// are all identical to the incoming one. Advisory only.
    pub async fn is_probably_fake(&self, booking_id: Uuid, lat: f64, lon: f64) -> CoreResult<bool> {
        let recent = self
            .tracks
            .recent_samples(booking_id, self.rules.fake_gps_window)
            .await?;
        if recent.len() < self.rules.fake_gps_min_samples {
            return Ok(false);
        }

        let eps = self.rules.fake_gps_epsilon_deg;
        let frozen = recent
            .iter()
            .all(|s| (s.latitude - lat).abs() < eps && (s.longitude - lon).abs() < eps);
        if frozen {
            warn!(%booking_id, lat, lon, "Possible fake GPS feed");
        }
        Ok(frozen)
    }

    /// Full check in order: required coordinates, speed, fake feed, region.
    pub async fn inspect(
        &self,
        booking_id: Uuid,
        lat: Option<f64>,
        lon: Option<f64>,
        now: DateTime<Utc>,
    ) -> CoreResult<(f64, f64)> {
        let (lat, lon) = Self::validate_coordinates(lat, lon)?;
        self.check_speed(booking_id, lat, lon, now).await?;
        self.is_probably_fake(booking_id, lat, lon).await?;
        self.check_region(booking_id, lat, lon);
        Ok((lat, lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use petwalk_core::memory::MemoryRepository;
    use petwalk_core::models::{LocationSample, SampleKind};

    fn sample(booking_id: Uuid, lat: f64, lon: f64, at: DateTime<Utc>) -> LocationSample {
        LocationSample {
            id: Uuid::new_v4(),
            booking_id,
            latitude: lat,
            longitude: lon,
            timestamp: at,
            accuracy: None,
            speed: None,
            altitude: None,
            kind: SampleKind::Walking,
        }
    }

    fn guard(repo: Arc<MemoryRepository>) -> LocationGuard {
        LocationGuard::new(repo, WalkRules::default())
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(matches!(
            LocationGuard::validate_coordinates(None, Some(127.0)),
            Err(CoreError::LocationRequired(_))
        ));
        assert!(matches!(
            LocationGuard::validate_coordinates(Some(37.5), None),
            Err(CoreError::LocationRequired(_))
        ));
        assert!(matches!(
            LocationGuard::validate_coordinates(Some(91.0), Some(127.0)),
            Err(CoreError::InvalidCoordinates { .. })
        ));
        assert!(matches!(
            LocationGuard::validate_coordinates(Some(37.5), Some(-181.0)),
            Err(CoreError::InvalidCoordinates { .. })
        ));
        assert_eq!(
            LocationGuard::validate_coordinates(Some(37.5), Some(127.0)).unwrap(),
            (37.5, 127.0)
        );
    }

    #[tokio::test]
    async fn test_first_sample_is_exempt_from_speed_check() {
        let repo = Arc::new(MemoryRepository::new());
        let g = guard(repo);
        let speed = g
            .check_speed(Uuid::new_v4(), 37.5, 127.0, Utc::now())
            .await
            .unwrap();
        assert_eq!(speed, None);
    }

    #[tokio::test]
    async fn test_rejects_one_km_in_ten_seconds() {
        let repo = Arc::new(MemoryRepository::new());
        let booking_id = Uuid::new_v4();
        let t0 = Utc::now();
        repo.append_sample(&sample(booking_id, 37.5000, 127.0, t0)).await.unwrap();

        // ~1.11 km north, 10 s later => ~400 km/h
        let err = guard(repo)
            .check_speed(booking_id, 37.5100, 127.0, t0 + Duration::seconds(10))
            .await
            .unwrap_err();
        match err {
            CoreError::UnrealisticLocationChange { speed_kmh } => assert!(speed_kmh > 50.0),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_accepts_walking_pace_and_skips_non_positive_elapsed() {
        let repo = Arc::new(MemoryRepository::new());
        let booking_id = Uuid::new_v4();
        let t0 = Utc::now();
        repo.append_sample(&sample(booking_id, 37.5000, 127.0, t0)).await.unwrap();
        let g = guard(repo);

        // ~111 m in one minute => ~6.7 km/h
        let speed = g
            .check_speed(booking_id, 37.5010, 127.0, t0 + Duration::minutes(1))
            .await
            .unwrap()
            .unwrap();
        assert!(speed > 5.0 && speed < 8.0, "got {}", speed);

        let same_instant = g.check_speed(booking_id, 37.6, 127.0, t0).await.unwrap();
        assert_eq!(same_instant, None);
    }

    #[tokio::test]
    async fn test_fake_feed_needs_three_identical_points() {
        let repo = Arc::new(MemoryRepository::new());
        let booking_id = Uuid::new_v4();
        let t0 = Utc::now();
        for i in 0..2 {
            repo.append_sample(&sample(booking_id, 37.5, 127.0, t0 + Duration::seconds(i)))
                .await
                .unwrap();
        }
        let g = guard(repo.clone());
        assert!(!g.is_probably_fake(booking_id, 37.5, 127.0).await.unwrap());

        repo.append_sample(&sample(booking_id, 37.5, 127.0, t0 + Duration::seconds(2)))
            .await
            .unwrap();
        assert!(g.is_probably_fake(booking_id, 37.5, 127.0).await.unwrap());
        assert!(!g.is_probably_fake(booking_id, 37.5001, 127.0).await.unwrap());
    }

    #[test]
    fn test_region_is_advisory() {
        let g = guard(Arc::new(MemoryRepository::new()));
        assert!(g.check_region(Uuid::new_v4(), 37.5, 127.0));
        assert!(!g.check_region(Uuid::new_v4(), 40.7, -74.0));
    }
}
