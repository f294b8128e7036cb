use async_trait::async_trait;
use chrono::{DateTime, Utc};
use petwalk_core::models::{Application, Booking, BookingStatus, NoteEntry, Place, WalkPhotos};
use petwalk_core::repository::{ApplicationRepository, BookingRepository, RepoResult};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::StoreError;

pub(crate) const BOOKING_COLUMNS: &str = "id, owner_id, walker_id, pet_id, method, status, date, duration_minutes, \
     total_price, pickup_location, pickup_address, dropoff_location, dropoff_address, emergency_contact, \
     insurance_covered, notes, regular_package, package_frequency, actual_start, actual_end, photo_start, \
     photo_middle, photo_end, version, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: Uuid,
    owner_id: Uuid,
    walker_id: Option<Uuid>,
    pet_id: Uuid,
    method: String,
    status: String,
    date: DateTime<Utc>,
    duration_minutes: i32,
    total_price: f64,
    pickup_location: Option<String>,
    pickup_address: Option<String>,
    dropoff_location: Option<String>,
    dropoff_address: Option<String>,
    emergency_contact: Option<String>,
    insurance_covered: bool,
    notes: Json<Vec<NoteEntry>>,
    regular_package: bool,
    package_frequency: Option<String>,
    actual_start: Option<DateTime<Utc>>,
    actual_end: Option<DateTime<Utc>>,
    photo_start: Option<String>,
    photo_middle: Option<String>,
    photo_end: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn place(location: Option<String>, address: Option<String>) -> Option<Place> {
    match (location, address) {
        (None, None) => None,
        (location, address) => Some(Place {
            location: location.unwrap_or_default(),
            address: address.unwrap_or_default(),
        }),
    }
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            owner_id: row.owner_id,
            walker_id: row.walker_id,
            pet_id: row.pet_id,
            method: row.method.parse().map_err(|e| StoreError::Decode(format!("{}", e)))?,
            status: row.status.parse().map_err(|e| StoreError::Decode(format!("{}", e)))?,
            date: row.date,
            duration_minutes: row.duration_minutes,
            total_price: row.total_price,
            pickup: place(row.pickup_location, row.pickup_address),
            dropoff: place(row.dropoff_location, row.dropoff_address),
            emergency_contact: row.emergency_contact,
            insurance_covered: row.insurance_covered,
            notes: row.notes.0,
            regular_package: row.regular_package,
            package_frequency: row.package_frequency,
            actual_start: row.actual_start,
            actual_end: row.actual_end,
            photos: WalkPhotos {
                start: row.photo_start,
                middle: row.photo_middle,
                end: row.photo_end,
            },
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn into_bookings(rows: Vec<BookingRow>) -> RepoResult<Vec<Booking>> {
    rows.into_iter()
        .map(|row| Booking::try_from(row).map_err(Into::into))
        .collect()
}

/// Version-checked write shared with the change-request transaction.
pub(crate) async fn write_booking<'e, E>(executor: E, booking: &Booking) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let pickup = booking.pickup.as_ref();
    let dropoff = booking.dropoff.as_ref();
    let result = sqlx::query(
        r#"
        UPDATE bookings SET
            walker_id = $3, status = $4, date = $5, duration_minutes = $6, total_price = $7,
            pickup_location = $8, pickup_address = $9, dropoff_location = $10, dropoff_address = $11,
            emergency_contact = $12, insurance_covered = $13, notes = $14, regular_package = $15,
            package_frequency = $16, actual_start = $17, actual_end = $18,
            photo_start = $19, photo_middle = $20, photo_end = $21,
            updated_at = $22, version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(booking.id)
    .bind(booking.version)
    .bind(booking.walker_id)
    .bind(booking.status.as_str())
    .bind(booking.date)
    .bind(booking.duration_minutes)
    .bind(booking.total_price)
    .bind(pickup.map(|p| p.location.as_str()))
    .bind(pickup.map(|p| p.address.as_str()))
    .bind(dropoff.map(|p| p.location.as_str()))
    .bind(dropoff.map(|p| p.address.as_str()))
    .bind(booking.emergency_contact.as_deref())
    .bind(booking.insurance_covered)
    .bind(Json(&booking.notes))
    .bind(booking.regular_package)
    .bind(booking.package_frequency.as_deref())
    .bind(booking.actual_start)
    .bind(booking.actual_end)
    .bind(booking.photos.start.as_deref())
    .bind(booking.photos.middle.as_deref())
    .bind(booking.photos.end.as_deref())
    .bind(booking.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, clause: &str, bind: Uuid) -> RepoResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE {} ORDER BY created_at DESC",
            BOOKING_COLUMNS, clause
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql).bind(bind).fetch_all(&self.pool).await?;
        into_bookings(rows)
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert_booking(&self, booking: &Booking) -> RepoResult<()> {
        let pickup = booking.pickup.as_ref();
        let dropoff = booking.dropoff.as_ref();
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, owner_id, walker_id, pet_id, method, status, date, duration_minutes, total_price,
                pickup_location, pickup_address, dropoff_location, dropoff_address, emergency_contact,
                insurance_covered, notes, regular_package, package_frequency, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(booking.id)
        .bind(booking.owner_id)
        .bind(booking.walker_id)
        .bind(booking.pet_id)
        .bind(booking.method.as_str())
        .bind(booking.status.as_str())
        .bind(booking.date)
        .bind(booking.duration_minutes)
        .bind(booking.total_price)
        .bind(pickup.map(|p| p.location.as_str()))
        .bind(pickup.map(|p| p.address.as_str()))
        .bind(dropoff.map(|p| p.location.as_str()))
        .bind(dropoff.map(|p| p.address.as_str()))
        .bind(booking.emergency_contact.as_deref())
        .bind(booking.insurance_covered)
        .bind(Json(&booking.notes))
        .bind(booking.regular_package)
        .bind(booking.package_frequency.as_deref())
        .bind(booking.version)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row: Option<BookingRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Booking::try_from).transpose()?)
    }

    async fn update_booking(&self, booking: &Booking) -> RepoResult<bool> {
        Ok(write_booking(&self.pool, booking).await?)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Booking>> {
        self.fetch_where("owner_id = $1", owner_id).await
    }

    async fn list_by_walker(&self, walker_id: Uuid) -> RepoResult<Vec<Booking>> {
        self.fetch_where("walker_id = $1", walker_id).await
    }

    async fn list_by_status(&self, status: BookingStatus) -> RepoResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE status = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        into_bookings(rows)
    }

    async fn list_open_requests(&self) -> RepoResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings WHERE method = 'OPEN_REQUEST' AND status = 'PENDING' ORDER BY created_at DESC",
            BOOKING_COLUMNS
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        into_bookings(rows)
    }
}

#[derive(sqlx::FromRow)]
struct ApplicationRow {
    id: Uuid,
    booking_id: Uuid,
    walker_id: Uuid,
    proposed_price: Option<f64>,
    message: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = StoreError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Application {
            id: row.id,
            booking_id: row.booking_id,
            walker_id: row.walker_id,
            proposed_price: row.proposed_price,
            message: row.message,
            status: row.status.parse().map_err(|e| StoreError::Decode(format!("{}", e)))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const APPLICATION_COLUMNS: &str =
    "id, booking_id, walker_id, proposed_price, message, status, created_at, updated_at";

fn into_applications(rows: Vec<ApplicationRow>) -> RepoResult<Vec<Application>> {
    rows.into_iter()
        .map(|row| Application::try_from(row).map_err(Into::into))
        .collect()
}

#[async_trait]
impl ApplicationRepository for PgBookingRepository {
    async fn insert_application(&self, application: &Application) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_applications (id, booking_id, walker_id, proposed_price, message, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(application.id)
        .bind(application.booking_id)
        .bind(application.walker_id)
        .bind(application.proposed_price)
        .bind(application.message.as_deref())
        .bind(application.status.as_str())
        .bind(application.created_at)
        .bind(application.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_application(&self, id: Uuid) -> RepoResult<Option<Application>> {
        let sql = format!("SELECT {} FROM booking_applications WHERE id = $1", APPLICATION_COLUMNS);
        let row: Option<ApplicationRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Application::try_from).transpose()?)
    }

    async fn update_application(&self, application: &Application, expected: BookingStatus) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE booking_applications SET status = $2, proposed_price = $3, message = $4, updated_at = $5 \
             WHERE id = $1 AND status = $6",
        )
        .bind(application.id)
        .bind(application.status.as_str())
        .bind(application.proposed_price)
        .bind(application.message.as_deref())
        .bind(application.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<Application>> {
        let sql = format!(
            "SELECT {} FROM booking_applications WHERE booking_id = $1 ORDER BY created_at ASC",
            APPLICATION_COLUMNS
        );
        let rows: Vec<ApplicationRow> = sqlx::query_as(&sql).bind(booking_id).fetch_all(&self.pool).await?;
        into_applications(rows)
    }

    async fn list_for_walker(&self, walker_id: Uuid) -> RepoResult<Vec<Application>> {
        let sql = format!(
            "SELECT {} FROM booking_applications WHERE walker_id = $1 ORDER BY created_at DESC",
            APPLICATION_COLUMNS
        );
        let rows: Vec<ApplicationRow> = sqlx::query_as(&sql).bind(walker_id).fetch_all(&self.pool).await?;
        into_applications(rows)
    }

    async fn has_open_bid(&self, owner_id: Uuid, walker_id: Uuid) -> RepoResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM booking_applications a
                JOIN bookings b ON b.id = a.booking_id
                WHERE a.walker_id = $1 AND b.owner_id = $2 AND a.status = 'WALKER_APPLIED'
            )
            "#,
        )
        .bind(walker_id)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petwalk_core::models::NoteKind;

    fn row(method: &str, status: &str) -> BookingRow {
        let now = Utc::now();
        BookingRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            walker_id: None,
            pet_id: Uuid::new_v4(),
            method: method.into(),
            status: status.into(),
            date: now,
            duration_minutes: 60,
            total_price: 20000.0,
            pickup_location: Some("Gate 3".into()),
            pickup_address: None,
            dropoff_location: None,
            dropoff_address: None,
            emergency_contact: None,
            insurance_covered: false,
            notes: Json(vec![NoteEntry {
                at: now,
                author: Uuid::nil(),
                kind: NoteKind::Request,
                text: "gentle".into(),
            }]),
            regular_package: false,
            package_frequency: None,
            actual_start: None,
            actual_end: None,
            photo_start: None,
            photo_middle: Some("https://cdn/m.jpg".into()),
            photo_end: None,
            version: 3,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_row_maps_to_booking() {
        let booking = Booking::try_from(row("OPEN_REQUEST", "WALKER_APPLIED")).unwrap();
        assert!(booking.is_open_request());
        assert_eq!(booking.status, BookingStatus::WalkerApplied);
        assert_eq!(booking.pickup.unwrap().address, "");
        assert!(booking.dropoff.is_none());
        assert_eq!(booking.photos.middle.as_deref(), Some("https://cdn/m.jpg"));
        assert_eq!(booking.notes.len(), 1);
        assert_eq!(booking.version, 3);
    }

    #[test]
    fn test_unknown_status_is_a_decode_error() {
        assert!(matches!(
            Booking::try_from(row("OPEN_REQUEST", "LOST")),
            Err(StoreError::Decode(_))
        ));
    }
}
