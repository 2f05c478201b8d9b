//! Postgres-backed [`BookingStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use super::{BookingStore, BookingUnit};
use crate::{
    db::{
        errors::Result,
        handlers::{Bookings, Driveways, Notifications, Users},
        models::{
            bookings::{BookingCreateDBRequest, BookingDBResponse},
            driveways::DrivewayDBResponse,
            notifications::{NotificationCreateDBRequest, NotificationDBResponse},
            users::UserDBResponse,
        },
    },
    types::{BookingId, DrivewayId, UserId},
};

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_by_id(id).await
    }

    async fn get_driveway(&self, id: DrivewayId) -> Result<Option<DrivewayDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Driveways::new(&mut conn).get_by_id(id).await
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<BookingDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Bookings::new(&mut conn).get_by_id(id).await
    }

    async fn count_overlapping(&self, driveway_id: DrivewayId, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Bookings::new(&mut conn).count_overlapping(driveway_id, start, end).await
    }

    #[instrument(skip(self), err)]
    async fn begin_booking(&self, driveway_id: DrivewayId) -> Result<Option<Box<dyn BookingUnit>>> {
        let mut tx = self.pool.begin().await?;

        // Blocks here while another transaction holds the driveway row
        let Some(driveway) = Driveways::new(&mut tx).lock_for_booking(driveway_id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        Ok(Some(Box::new(PostgresBookingUnit { tx, driveway })))
    }

    async fn set_payment_intent(&self, id: BookingId, payment_intent_id: &str) -> Result<BookingDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Bookings::new(&mut conn).set_payment_intent(id, payment_intent_id).await
    }

    async fn create_notifications(&self, requests: &[NotificationCreateDBRequest]) -> Result<Vec<NotificationDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Notifications::new(&mut conn).create_bulk(requests).await
    }
}

/// Transaction holding `FOR UPDATE` on the driveway row; rolled back on drop unless committed.
struct PostgresBookingUnit {
    tx: Transaction<'static, Postgres>,
    driveway: DrivewayDBResponse,
}

#[async_trait]
impl BookingUnit for PostgresBookingUnit {
    fn driveway(&self) -> &DrivewayDBResponse {
        &self.driveway
    }

    async fn count_overlapping(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
        Bookings::new(&mut self.tx).count_overlapping(self.driveway.id, start, end).await
    }

    async fn insert_booking(&mut self, request: &BookingCreateDBRequest) -> Result<BookingDBResponse> {
        Bookings::new(&mut self.tx).create(request).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::bookings::{BookingStatus, PaymentStatus};
    use crate::db::models::notifications::NotificationKind;
    use crate::test_utils::{create_pg_driveway, create_pg_user, hours_from_now};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn booking_request(driveway_id: DrivewayId, user_id: UserId, start_h: i64, end_h: i64) -> BookingCreateDBRequest {
        BookingCreateDBRequest {
            id: Uuid::new_v4(),
            driveway_id,
            user_id,
            start_time: hours_from_now(start_h),
            end_time: hours_from_now(end_h),
            total_price: Decimal::new(2000, 2),
            payment_intent_id: None,
            special_requests: None,
            vehicle_info: None,
        }
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_unit_insert_and_count(pool: PgPool) {
        let owner = create_pg_user(&pool, "owner@example.com").await;
        let driver = create_pg_user(&pool, "driver@example.com").await;
        let driveway = create_pg_driveway(&pool, owner.id, 2).await;
        let store = PostgresStore::new(pool.clone());

        let mut unit = store.begin_booking(driveway.id).await.unwrap().unwrap();
        assert_eq!(unit.driveway().capacity, 2);
        let booking = unit.insert_booking(&booking_request(driveway.id, driver.id, 2, 4)).await.unwrap();
        assert_eq!(unit.count_overlapping(hours_from_now(3), hours_from_now(5)).await.unwrap(), 1);
        unit.commit().await.unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert_eq!(
            store
                .count_overlapping(driveway.id, hours_from_now(4), hours_from_now(6))
                .await
                .unwrap(),
            0,
            "touching windows do not overlap"
        );
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_dropped_unit_rolls_back(pool: PgPool) {
        let owner = create_pg_user(&pool, "owner@example.com").await;
        let driver = create_pg_user(&pool, "driver@example.com").await;
        let driveway = create_pg_driveway(&pool, owner.id, 1).await;
        let store = PostgresStore::new(pool.clone());

        let request = booking_request(driveway.id, driver.id, 2, 4);
        {
            let mut unit = store.begin_booking(driveway.id).await.unwrap().unwrap();
            unit.insert_booking(&request).await.unwrap();
        }

        assert!(store.get_booking(request.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_begin_booking_unknown_driveway(pool: PgPool) {
        let store = PostgresStore::new(pool);
        assert!(store.begin_booking(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_set_payment_intent_and_notifications(pool: PgPool) {
        let owner = create_pg_user(&pool, "owner@example.com").await;
        let driver = create_pg_user(&pool, "driver@example.com").await;
        let driveway = create_pg_driveway(&pool, owner.id, 1).await;
        let store = PostgresStore::new(pool.clone());

        let mut unit = store.begin_booking(driveway.id).await.unwrap().unwrap();
        let booking = unit.insert_booking(&booking_request(driveway.id, driver.id, 2, 4)).await.unwrap();
        unit.commit().await.unwrap();

        let updated = store.set_payment_intent(booking.id, "pi_test_123").await.unwrap();
        assert_eq!(updated.payment_intent_id.as_deref(), Some("pi_test_123"));

        let created = store
            .create_notifications(&[
                NotificationCreateDBRequest {
                    user_id: driver.id,
                    kind: NotificationKind::BookingCreated,
                    title: "Booking created".into(),
                    message: "ok".into(),
                    booking_id: Some(booking.id),
                },
                NotificationCreateDBRequest {
                    user_id: owner.id,
                    kind: NotificationKind::BookingRequest,
                    title: "New booking request".into(),
                    message: "ok".into(),
                    booking_id: Some(booking.id),
                },
            ])
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|n| !n.is_read));
    }
}
