use async_trait::async_trait;
use petwalk_core::collaborators::{CollabResult, UserDirectory, WalkerDirectory};
use petwalk_core::models::{UserProfile, WalkerProfile, WalkerStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::StoreError;

/// Read-only view over the account tables owned by the user service.
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    phone: Option<String>,
    email: Option<String>,
    emergency_contact: Option<String>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        UserProfile {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            emergency_contact: row.emergency_contact,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WalkerRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    status: String,
    hourly_rate: Option<f64>,
    phone: Option<String>,
}

fn walker_status(raw: &str) -> Result<WalkerStatus, StoreError> {
    match raw {
        "ACTIVE" => Ok(WalkerStatus::Active),
        "INACTIVE" => Ok(WalkerStatus::Inactive),
        "SUSPENDED" => Ok(WalkerStatus::Suspended),
        other => Err(StoreError::Decode(format!("unknown walker status {}", other))),
    }
}

impl TryFrom<WalkerRow> for WalkerProfile {
    type Error = StoreError;

    fn try_from(row: WalkerRow) -> Result<Self, Self::Error> {
        Ok(WalkerProfile {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            status: walker_status(&row.status)?,
            hourly_rate: row.hourly_rate,
            phone: row.phone,
        })
    }
}

const WALKER_COLUMNS: &str = "id, user_id, name, status, hourly_rate, phone";

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn get_user(&self, id: Uuid) -> CollabResult<Option<UserProfile>> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, name, phone, email, emergency_contact FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(UserProfile::from))
    }

    async fn pet_name(&self, pet_id: Uuid) -> CollabResult<Option<String>> {
        let name: Option<String> = sqlx::query_scalar("SELECT name FROM pets WHERE id = $1")
            .bind(pet_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }
}

#[async_trait]
impl WalkerDirectory for PgDirectory {
    async fn get_walker(&self, id: Uuid) -> CollabResult<Option<WalkerProfile>> {
        let sql = format!("SELECT {} FROM walkers WHERE id = $1", WALKER_COLUMNS);
        let row: Option<WalkerRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(WalkerProfile::try_from).transpose()?)
    }

    async fn find_by_user(&self, user_id: Uuid) -> CollabResult<Option<WalkerProfile>> {
        let sql = format!("SELECT {} FROM walkers WHERE user_id = $1", WALKER_COLUMNS);
        let row: Option<WalkerRow> = sqlx::query_as(&sql).bind(user_id).fetch_optional(&self.pool).await?;
        Ok(row.map(WalkerProfile::try_from).transpose()?)
    }
}
