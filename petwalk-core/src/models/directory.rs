use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub emergency_contact: Option<String>,
}

impl UserProfile {
    /// Where pushes go: phone first, then e-mail.
    pub fn contact(&self) -> Option<&str> {
        self.phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.email.as_deref().filter(|e| !e.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalkerStatus {
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalkerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub status: WalkerStatus,
    pub hourly_rate: Option<f64>,
    pub phone: Option<String>,
}

impl WalkerProfile {
    pub fn is_active(&self) -> bool {
        self.status == WalkerStatus::Active
    }
}
