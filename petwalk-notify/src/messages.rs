use chrono::{DateTime, Utc};
use petwalk_core::collaborators::TextGenerator;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Start,
    Progress,
    Complete,
    Stationary,
    Emergency,
    Termination,
    Confirmed,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Start => "START",
            MessageKind::Progress => "PROGRESS",
            MessageKind::Complete => "COMPLETE",
            MessageKind::Stationary => "STATIONARY",
            MessageKind::Emergency => "EMERGENCY",
            MessageKind::Termination => "TERMINATION",
            MessageKind::Confirmed => "CONFIRMED",
        }
    }
}

/// Activity wording derived from the latest reported speed.
pub fn location_description(speed_kmh: Option<f64>) -> &'static str {
    match speed_kmh {
        Some(v) if v > 3.0 => "moving actively",
        Some(v) if v < 1.0 => "resting",
        _ => "walking",
    }
}

/// Everything a notification needs to be worded.
#[derive(Debug, Clone, PartialEq)]
pub enum WalkMessage {
    Confirmed {
        pet_name: String,
        date: DateTime<Utc>,
    },
    Started {
        pet_name: String,
        duration_minutes: i32,
    },
    Progress {
        pet_name: String,
        distance_km: f64,
        elapsed_minutes: i64,
        speed_kmh: Option<f64>,
    },
    Completed {
        pet_name: String,
        distance_km: f64,
        duration_minutes: i64,
        route: &'static str,
    },
    Stationary {
        pet_name: String,
        minutes: i64,
    },
    Emergency {
        pet_name: String,
        service: String,
        location: Option<String>,
        description: Option<String>,
    },
    Termination {
        pet_name: String,
        requested_by: String,
        reason: String,
    },
}

impl WalkMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            WalkMessage::Confirmed { .. } => MessageKind::Confirmed,
            WalkMessage::Started { .. } => MessageKind::Start,
            WalkMessage::Progress { .. } => MessageKind::Progress,
            WalkMessage::Completed { .. } => MessageKind::Complete,
            WalkMessage::Stationary { .. } => MessageKind::Stationary,
            WalkMessage::Emergency { .. } => MessageKind::Emergency,
            WalkMessage::Termination { .. } => MessageKind::Termination,
        }
    }

    /// Prompt for the text generator. Safety-relevant and transactional
    /// messages return `None` and always use the fixed wording.
    pub fn prompt(&self) -> Option<String> {
        const STYLE: &str = "Write one short, warm push notification (max 2 sentences, one emoji) for a dog owner.";
        match self {
            WalkMessage::Started {
                pet_name,
                duration_minutes,
            } => Some(format!(
                "{} {}'s {}-minute walk has just started.",
                STYLE, pet_name, duration_minutes
            )),
            WalkMessage::Progress {
                pet_name,
                distance_km,
                elapsed_minutes,
                speed_kmh,
            } => Some(format!(
                "{} {} has walked {:.2} km in {} minutes and is currently {}.",
                STYLE,
                pet_name,
                distance_km,
                elapsed_minutes,
                location_description(*speed_kmh)
            )),
            WalkMessage::Completed {
                pet_name,
                distance_km,
                duration_minutes,
                route,
            } => Some(format!(
                "{} {} finished a {}-minute walk covering {:.2} km ({}).",
                STYLE, pet_name, duration_minutes, distance_km, route
            )),
            WalkMessage::Stationary { pet_name, minutes } => Some(format!(
                "{} {} has stayed in the same spot for about {} minutes; reassure the owner that the walker is with them.",
                STYLE, pet_name, minutes
            )),
            WalkMessage::Confirmed { .. }
            | WalkMessage::Emergency { .. }
            | WalkMessage::Termination { .. } => None,
        }
    }

    pub fn fallback(&self) -> String {
        match self {
            WalkMessage::Confirmed { pet_name, date } => format!(
                "📅 {}'s walk on {} is confirmed!",
                pet_name,
                date.format("%Y-%m-%d %H:%M")
            ),
            WalkMessage::Started { pet_name, .. } => format!("🦮 {}'s walk has started!", pet_name),
            WalkMessage::Progress { pet_name, .. } => format!("🐕 {} is happily walking!", pet_name),
            WalkMessage::Completed { pet_name, .. } => format!("✅ {} walk completed!", pet_name),
            WalkMessage::Stationary { pet_name, minutes } => format!(
                "📍 {} has been resting in one spot for {} minutes.",
                pet_name, minutes
            ),
            WalkMessage::Emergency {
                pet_name,
                service,
                location,
                description,
            } => {
                let mut text = format!("🚨 Emergency during {}'s walk: {} was called.", pet_name, service);
                if let Some(location) = location {
                    text.push_str(&format!(" Location: {}.", location));
                }
                if let Some(description) = description {
                    text.push_str(&format!(" {}", description));
                }
                text
            }
            WalkMessage::Termination {
                pet_name,
                requested_by,
                reason,
            } => format!(
                "⚠️ {} asked to end {}'s walk early: {}",
                requested_by, pet_name, reason
            ),
        }
    }
}

/// Words notifications, preferring the text generator when one is configured.
#[derive(Clone, Default)]
pub struct MessageComposer {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl MessageComposer {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    pub async fn compose(&self, message: &WalkMessage) -> String {
        let (Some(generator), Some(prompt)) = (&self.generator, message.prompt()) else {
            return message.fallback();
        };
        match generator.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!(kind = message.kind().as_str(), "Text generator returned nothing, using template");
                message.fallback()
            }
            Err(e) => {
                warn!(kind = message.kind().as_str(), error = %e, "Text generator failed, using template");
                message.fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petwalk_core::collaborators::MockTextGenerator;

    fn progress() -> WalkMessage {
        WalkMessage::Progress {
            pet_name: "Bori".into(),
            distance_km: 1.2,
            elapsed_minutes: 20,
            speed_kmh: Some(4.0),
        }
    }

    #[test]
    fn test_location_description() {
        assert_eq!(location_description(Some(4.2)), "moving actively");
        assert_eq!(location_description(Some(0.5)), "resting");
        assert_eq!(location_description(Some(2.0)), "walking");
        assert_eq!(location_description(None), "walking");
    }

    #[tokio::test]
    async fn test_generator_failure_falls_back() {
        let composer = MessageComposer::new(Some(Arc::new(MockTextGenerator::new(None))));
        assert_eq!(composer.compose(&progress()).await, "🐕 Bori is happily walking!");
    }

    #[tokio::test]
    async fn test_blank_generator_output_falls_back() {
        let composer = MessageComposer::new(Some(Arc::new(MockTextGenerator::new(Some("  ".into())))));
        assert_eq!(composer.compose(&progress()).await, "🐕 Bori is happily walking!");
    }

    #[tokio::test]
    async fn test_generator_text_is_used() {
        let composer = MessageComposer::new(Some(Arc::new(MockTextGenerator::new(Some(
            "Bori is having a blast 🐾".into(),
        )))));
        assert_eq!(composer.compose(&progress()).await, "Bori is having a blast 🐾");
    }

    #[tokio::test]
    async fn test_emergency_never_uses_generator() {
        let composer = MessageComposer::new(Some(Arc::new(MockTextGenerator::new(Some("hi".into())))));
        let text = composer
            .compose(&WalkMessage::Emergency {
                pet_name: "Bori".into(),
                service: "112".into(),
                location: Some("Han river park".into()),
                description: None,
            })
            .await;
        assert!(text.starts_with("🚨"));
        assert!(text.contains("112"));
    }
}
