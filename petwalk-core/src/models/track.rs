use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SampleKind {
    Start,
    #[default]
    Walking,
    Paused,
    End,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleKind::Start => "START",
            SampleKind::Walking => "WALKING",
            SampleKind::Paused => "PAUSED",
            SampleKind::End => "END",
        }
    }
}

impl FromStr for SampleKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START" => Ok(SampleKind::Start),
            "WALKING" => Ok(SampleKind::Walking),
            "PAUSED" => Ok(SampleKind::Paused),
            "END" => Ok(SampleKind::End),
            other => Err(CoreError::InvalidInput(format!("unknown sample kind {}", other))),
        }
    }
}

/// One recorded GPS point of a walk. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationSample {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub accuracy: Option<f64>,
    /// km/h as reported by the device
    pub speed: Option<f64>,
    pub altitude: Option<f64>,
    pub kind: SampleKind,
}
