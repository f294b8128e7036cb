use serde::Deserialize;

/// Inclusive lat/lon box; samples outside it are logged, not rejected.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct RegionBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl RegionBounds {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

impl Default for RegionBounds {
    fn default() -> Self {
        // South Korea
        Self {
            min_lat: 33.0,
            max_lat: 39.0,
            min_lon: 124.0,
            max_lon: 132.0,
        }
    }
}

/// Tunables for tracking, anomaly detection and notification pacing.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WalkRules {
    pub max_speed_kmh: f64,
    pub fake_gps_epsilon_deg: f64,
    pub fake_gps_window: usize,
    pub fake_gps_min_samples: usize,
    pub region: Option<RegionBounds>,
    pub stationary_radius_m: f64,
    pub stationary_window_minutes: i64,
    pub stationary_min_samples: usize,
    pub stationary_cooldown_minutes: i64,
    pub progress_cooldown_minutes: i64,
    pub progress_interval_seconds: u64,
    pub stationary_interval_seconds: u64,
    pub cooldown_ttl_hours: i64,
    pub default_hourly_rate: f64,
}

impl Default for WalkRules {
    fn default() -> Self {
        Self {
            max_speed_kmh: 50.0,
            fake_gps_epsilon_deg: 0.00001,
            fake_gps_window: 5,
            fake_gps_min_samples: 3,
            region: Some(RegionBounds::default()),
            stationary_radius_m: 20.0,
            stationary_window_minutes: 5,
            stationary_min_samples: 3,
            stationary_cooldown_minutes: 30,
            progress_cooldown_minutes: 10,
            progress_interval_seconds: 600,
            stationary_interval_seconds: 300,
            cooldown_ttl_hours: 24,
            default_hourly_rate: 20000.0,
        }
    }
}
