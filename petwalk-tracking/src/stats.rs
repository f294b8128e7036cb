use petwalk_core::geo::haversine_km;
use petwalk_core::models::LocationSample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteLabel {
    ShortLoop,
    MediumRoute,
    LongRoute,
    ShortWalk,
    NoData,
}

impl RouteLabel {
    pub fn describe(&self) -> &'static str {
        match self {
            RouteLabel::ShortLoop => "short loop near the start",
            RouteLabel::MediumRoute => "medium route",
            RouteLabel::LongRoute => "long route",
            RouteLabel::ShortWalk => "short walk",
            RouteLabel::NoData => "no route data",
        }
    }
}

/// Aggregates over a walk's ordered track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathStatistics {
    pub total_distance_km: f64,
    pub duration_minutes: i64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub sample_count: usize,
    pub route: RouteLabel,
}

impl PathStatistics {
    pub fn empty() -> Self {
        Self {
            total_distance_km: 0.0,
            duration_minutes: 0,
            average_speed_kmh: 0.0,
            max_speed_kmh: 0.0,
            sample_count: 0,
            route: RouteLabel::NoData,
        }
    }

    /// `samples` must be ordered by timestamp.
    pub fn from_samples(samples: &[LocationSample]) -> Self {
        let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
            return Self::empty();
        };

        let total_distance_km: f64 = samples
            .windows(2)
            .map(|w| haversine_km(w[0].latitude, w[0].longitude, w[1].latitude, w[1].longitude))
            .sum();

        let duration_minutes = (last.timestamp - first.timestamp).num_minutes();
        let average_speed_kmh = if duration_minutes > 0 {
            total_distance_km / (duration_minutes as f64 / 60.0)
        } else {
            0.0
        };

        let max_speed_kmh = samples
            .iter()
            .filter_map(|s| s.speed)
            .fold(0.0_f64, f64::max);

        let route = if samples.len() < 2 {
            RouteLabel::ShortWalk
        } else {
            let span = haversine_km(first.latitude, first.longitude, last.latitude, last.longitude);
            if span < 0.1 {
                RouteLabel::ShortLoop
            } else if span < 0.5 {
                RouteLabel::MediumRoute
            } else {
                RouteLabel::LongRoute
            }
        };

        Self {
            total_distance_km,
            duration_minutes,
            average_speed_kmh,
            max_speed_kmh,
            sample_count: samples.len(),
            route,
        }
    }
}
