use async_trait::async_trait;
use chrono::{DateTime, Utc};
use petwalk_core::models::{Booking, BookingChangeRequest, ProposedChanges};
use petwalk_core::repository::{ChangeRequestRepository, RepoResult};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::booking_repo::write_booking;
use crate::StoreError;

const CHANGE_COLUMNS: &str =
    "c.id, c.booking_id, c.requested_by, c.changes, c.reason, c.status, c.response, c.responded_at, c.created_at";

#[derive(sqlx::FromRow)]
struct ChangeRow {
    id: Uuid,
    booking_id: Uuid,
    requested_by: Uuid,
    changes: Json<ProposedChanges>,
    reason: Option<String>,
    status: String,
    response: Option<String>,
    responded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChangeRow> for BookingChangeRequest {
    type Error = StoreError;

    fn try_from(row: ChangeRow) -> Result<Self, Self::Error> {
        Ok(BookingChangeRequest {
            id: row.id,
            booking_id: row.booking_id,
            requested_by: row.requested_by,
            changes: row.changes.0,
            reason: row.reason,
            status: row.status.parse().map_err(|e| StoreError::Decode(format!("{}", e)))?,
            response: row.response,
            responded_at: row.responded_at,
            created_at: row.created_at,
        })
    }
}

fn into_changes(rows: Vec<ChangeRow>) -> RepoResult<Vec<BookingChangeRequest>> {
    rows.into_iter()
        .map(|row| BookingChangeRequest::try_from(row).map_err(Into::into))
        .collect()
}

pub struct PgChangeRequestRepository {
    pool: PgPool,
}

impl PgChangeRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, filter: &str, bind: Uuid) -> RepoResult<Vec<BookingChangeRequest>> {
        let sql = format!(
            "SELECT {} FROM booking_change_requests c JOIN bookings b ON b.id = c.booking_id WHERE {} ORDER BY c.created_at DESC",
            CHANGE_COLUMNS, filter
        );
        let rows: Vec<ChangeRow> = sqlx::query_as(&sql).bind(bind).fetch_all(&self.pool).await?;
        into_changes(rows)
    }
}

#[async_trait]
impl ChangeRequestRepository for PgChangeRequestRepository {
    async fn insert_change(&self, request: &BookingChangeRequest) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_change_requests (id, booking_id, requested_by, changes, reason, status, response, responded_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(request.id)
        .bind(request.booking_id)
        .bind(request.requested_by)
        .bind(Json(&request.changes))
        .bind(request.reason.as_deref())
        .bind(request.status.as_str())
        .bind(request.response.as_deref())
        .bind(request.responded_at)
        .bind(request.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_change(&self, id: Uuid) -> RepoResult<Option<BookingChangeRequest>> {
        let sql = format!("SELECT {} FROM booking_change_requests c WHERE c.id = $1", CHANGE_COLUMNS);
        let row: Option<ChangeRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(BookingChangeRequest::try_from).transpose()?)
    }

    async fn list_changes_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>> {
        self.fetch("c.booking_id = $1", booking_id).await
    }

    async fn list_pending_by_requester(&self, user_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>> {
        self.fetch("c.requested_by = $1 AND c.status = 'PENDING'", user_id).await
    }

    async fn list_pending_for_owner(&self, owner_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>> {
        self.fetch("b.owner_id = $1 AND c.status = 'PENDING'", owner_id).await
    }

    async fn list_pending_for_walker(&self, walker_id: Uuid) -> RepoResult<Vec<BookingChangeRequest>> {
        self.fetch("b.walker_id = $1 AND c.status = 'PENDING'", walker_id).await
    }

    async fn resolve(&self, request: &BookingChangeRequest, booking: Option<&Booking>) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE booking_change_requests
            SET status = $2, response = $3, responded_at = $4
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(request.id)
        .bind(request.status.as_str())
        .bind(request.response.as_deref())
        .bind(request.responded_at)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(booking) = booking {
            if !write_booking(&mut *tx, booking).await? {
                tx.rollback().await?;
                return Ok(false);
            }
        }

        tx.commit().await?;
        Ok(true)
    }
}
