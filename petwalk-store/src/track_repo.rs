use async_trait::async_trait;
use chrono::{DateTime, Utc};
use petwalk_core::models::LocationSample;
use petwalk_core::repository::{RepoResult, TrackRepository};
use sqlx::PgPool;
use uuid::Uuid;

use crate::StoreError;

const SAMPLE_COLUMNS: &str =
    "id, booking_id, latitude, longitude, recorded_at, accuracy, speed, altitude, kind";

#[derive(sqlx::FromRow)]
struct SampleRow {
    id: Uuid,
    booking_id: Uuid,
    latitude: f64,
    longitude: f64,
    recorded_at: DateTime<Utc>,
    accuracy: Option<f64>,
    speed: Option<f64>,
    altitude: Option<f64>,
    kind: String,
}

impl TryFrom<SampleRow> for LocationSample {
    type Error = StoreError;

    fn try_from(row: SampleRow) -> Result<Self, Self::Error> {
        Ok(LocationSample {
            id: row.id,
            booking_id: row.booking_id,
            latitude: row.latitude,
            longitude: row.longitude,
            timestamp: row.recorded_at,
            accuracy: row.accuracy,
            speed: row.speed,
            altitude: row.altitude,
            kind: row.kind.parse().map_err(|e| StoreError::Decode(format!("{}", e)))?,
        })
    }
}

fn into_samples(rows: Vec<SampleRow>) -> RepoResult<Vec<LocationSample>> {
    rows.into_iter()
        .map(|row| LocationSample::try_from(row).map_err(Into::into))
        .collect()
}

pub struct PgTrackRepository {
    pool: PgPool,
}

impl PgTrackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TrackRepository for PgTrackRepository {
    async fn append_sample(&self, sample: &LocationSample) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO walk_tracks (id, booking_id, latitude, longitude, recorded_at, accuracy, speed, altitude, kind)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(sample.id)
        .bind(sample.booking_id)
        .bind(sample.latitude)
        .bind(sample.longitude)
        .bind(sample.timestamp)
        .bind(sample.accuracy)
        .bind(sample.speed)
        .bind(sample.altitude)
        .bind(sample.kind.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_samples(&self, booking_id: Uuid) -> RepoResult<Vec<LocationSample>> {
        let sql = format!(
            "SELECT {} FROM walk_tracks WHERE booking_id = $1 ORDER BY recorded_at ASC",
            SAMPLE_COLUMNS
        );
        let rows: Vec<SampleRow> = sqlx::query_as(&sql).bind(booking_id).fetch_all(&self.pool).await?;
        into_samples(rows)
    }

    async fn list_since(&self, booking_id: Uuid, since: DateTime<Utc>) -> RepoResult<Vec<LocationSample>> {
        let sql = format!(
            "SELECT {} FROM walk_tracks WHERE booking_id = $1 AND recorded_at > $2 ORDER BY recorded_at ASC",
            SAMPLE_COLUMNS
        );
        let rows: Vec<SampleRow> = sqlx::query_as(&sql)
            .bind(booking_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        into_samples(rows)
    }

    async fn recent_samples(&self, booking_id: Uuid, limit: usize) -> RepoResult<Vec<LocationSample>> {
        let sql = format!(
            "SELECT {} FROM walk_tracks WHERE booking_id = $1 ORDER BY recorded_at DESC LIMIT $2",
            SAMPLE_COLUMNS
        );
        let rows: Vec<SampleRow> = sqlx::query_as(&sql)
            .bind(booking_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        into_samples(rows)
    }

    async fn latest_sample(&self, booking_id: Uuid) -> RepoResult<Option<LocationSample>> {
        let sql = format!(
            "SELECT {} FROM walk_tracks WHERE booking_id = $1 ORDER BY recorded_at DESC LIMIT 1",
            SAMPLE_COLUMNS
        );
        let row: Option<SampleRow> = sqlx::query_as(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(LocationSample::try_from).transpose()?)
    }
}
