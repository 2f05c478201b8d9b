use chrono::{DateTime, Utc};
use sqlx::{PgConnection, types::Json};
use tracing::instrument;

use crate::{
    db::{
        errors::{DbError, Result},
        models::bookings::{BookingCreateDBRequest, BookingDBResponse},
    },
    types::{BookingId, DrivewayId, abbrev_uuid},
};

const BOOKING_COLUMNS: &str = "id, driveway_id, user_id, start_time, end_time, total_price, status, payment_status, \
     payment_intent_id, special_requests, vehicle_info, created_at, updated_at";

pub struct Bookings<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Bookings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Count capacity-holding bookings on a driveway overlapping `[start, end)`.
    ///
    /// Intervals are half-open: a booking ending exactly when another starts does not overlap it.
    #[instrument(skip(self), fields(driveway_id = %abbrev_uuid(&driveway_id)), err)]
    pub async fn count_overlapping(&mut self, driveway_id: DrivewayId, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM bookings
            WHERE driveway_id = $1
              AND status IN ('pending', 'confirmed')
              AND start_time < $3
              AND end_time > $2
            "#,
        )
        .bind(driveway_id)
        .bind(start)
        .bind(end)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    #[instrument(skip(self, request), fields(booking_id = %abbrev_uuid(&request.id)), err)]
    pub async fn create(&mut self, request: &BookingCreateDBRequest) -> Result<BookingDBResponse> {
        let query = format!(
            r#"
            INSERT INTO bookings
                (id, driveway_id, user_id, start_time, end_time, total_price, status, payment_status,
                 payment_intent_id, special_requests, vehicle_info)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', 'pending', $7, $8, $9)
            RETURNING {BOOKING_COLUMNS}
            "#
        );

        let booking = sqlx::query_as::<_, BookingDBResponse>(&query)
            .bind(request.id)
            .bind(request.driveway_id)
            .bind(request.user_id)
            .bind(request.start_time)
            .bind(request.end_time)
            .bind(request.total_price)
            .bind(&request.payment_intent_id)
            .bind(&request.special_requests)
            .bind(request.vehicle_info.clone().map(Json))
            .fetch_one(&mut *self.db)
            .await?;

        Ok(booking)
    }

    #[instrument(skip(self), fields(booking_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: BookingId) -> Result<Option<BookingDBResponse>> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");

        let booking = sqlx::query_as::<_, BookingDBResponse>(&query)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(booking)
    }

    /// Record the payment authorization created for a booking
    #[instrument(skip(self, payment_intent_id), fields(booking_id = %abbrev_uuid(&id)), err)]
    pub async fn set_payment_intent(&mut self, id: BookingId, payment_intent_id: &str) -> Result<BookingDBResponse> {
        let query = format!(
            r#"
            UPDATE bookings
            SET payment_intent_id = $2, updated_at = now()
            WHERE id = $1
            RETURNING {BOOKING_COLUMNS}
            "#
        );

        sqlx::query_as::<_, BookingDBResponse>(&query)
            .bind(id)
            .bind(payment_intent_id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::NotFound)
    }
}
