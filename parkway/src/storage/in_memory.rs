//! Process-local [`BookingStore`] used by tests and local development.
//!
//! Mutual exclusion per driveway comes from an async mutex whose owned guard lives inside the
//! open [`BookingUnit`]. Rows written in a unit are buffered and only become visible to other
//! readers when the unit commits.

use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
#[cfg(test)]
use rust_decimal::Decimal;
use sqlx::types::Json;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{BookingStore, BookingUnit, overlaps};
use crate::{
    db::{
        errors::{DbError, Result},
        models::{
            bookings::{BookingCreateDBRequest, BookingDBResponse, BookingStatus, PaymentStatus},
            driveways::{DrivewayCreateDBRequest, DrivewayDBResponse},
            notifications::{NotificationCreateDBRequest, NotificationDBResponse},
            users::UserDBResponse,
        },
    },
    types::{BookingId, DrivewayId, UserId},
};

#[derive(Default)]
struct State {
    users: HashMap<UserId, UserDBResponse>,
    driveways: HashMap<DrivewayId, DrivewayDBResponse>,
    bookings: HashMap<BookingId, BookingDBResponse>,
    notifications: Vec<NotificationDBResponse>,
}

impl State {
    fn count_overlapping(&self, driveway_id: DrivewayId, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        self.bookings
            .values()
            .filter(|b| b.driveway_id == driveway_id && b.status.holds_capacity() && overlaps(b.start_time, b.end_time, start, end))
            .count() as i64
    }

    fn payment_intent_taken(&self, payment_intent_id: &str, except: Option<BookingId>) -> bool {
        self.bookings
            .values()
            .any(|b| Some(b.id) != except && b.payment_intent_id.as_deref() == Some(payment_intent_id))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    locks: Arc<DashMap<DrivewayId, Arc<Mutex<()>>>>,
    fail_notifications: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn driveway_lock(&self, driveway_id: DrivewayId) -> Arc<Mutex<()>> {
        self.locks.entry(driveway_id).or_default().clone()
    }

    pub fn insert_user(&self, email: &str, name: Option<&str>) -> UserDBResponse {
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.map(str::to_string),
            created_at: Utc::now(),
        };
        self.write().users.insert(user.id, user.clone());
        user
    }

    pub fn insert_driveway(&self, request: &DrivewayCreateDBRequest) -> DrivewayDBResponse {
        let now = Utc::now();
        let driveway = DrivewayDBResponse {
            id: Uuid::new_v4(),
            owner_id: request.owner_id,
            title: request.title.clone(),
            address: request.address.clone(),
            is_active: request.is_active,
            is_available: request.is_available,
            price_per_hour: request.price_per_hour,
            capacity: request.capacity,
            created_at: now,
            updated_at: now,
        };
        self.write().driveways.insert(driveway.id, driveway.clone());
        driveway
    }

    pub fn bookings_for_driveway(&self, driveway_id: DrivewayId) -> Vec<BookingDBResponse> {
        let mut bookings: Vec<_> = self.read().bookings.values().filter(|b| b.driveway_id == driveway_id).cloned().collect();
        bookings.sort_by_key(|b| (b.start_time, b.created_at));
        bookings
    }

    pub fn notifications_for_user(&self, user_id: UserId) -> Vec<NotificationDBResponse> {
        self.read().notifications.iter().filter(|n| n.user_id == user_id).cloned().collect()
    }
}

/// Fixture helpers that write around the booking workflow
#[cfg(test)]
impl InMemoryStore {
    pub fn remove_driveway(&self, driveway_id: DrivewayId) {
        self.write().driveways.remove(&driveway_id);
    }

    /// Record an existing booking directly, bypassing the capacity check.
    pub fn seed_booking(
        &self,
        driveway_id: DrivewayId,
        user_id: UserId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        status: BookingStatus,
    ) -> BookingDBResponse {
        let now = Utc::now();
        let booking = BookingDBResponse {
            id: Uuid::new_v4(),
            driveway_id,
            user_id,
            start_time,
            end_time,
            total_price: Decimal::ZERO,
            status,
            payment_status: PaymentStatus::Pending,
            payment_intent_id: None,
            special_requests: None,
            vehicle_info: None,
            created_at: now,
            updated_at: now,
        };
        self.write().bookings.insert(booking.id, booking.clone());
        booking
    }

    pub fn set_total_price(&self, id: BookingId, total_price: Decimal) -> Option<BookingDBResponse> {
        let mut state = self.write();
        let booking = state.bookings.get_mut(&id)?;
        booking.total_price = total_price;
        booking.updated_at = Utc::now();
        Some(booking.clone())
    }

    /// Make subsequent notification inserts fail
    pub fn fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn get_driveway(&self, id: DrivewayId) -> Result<Option<DrivewayDBResponse>> {
        Ok(self.read().driveways.get(&id).cloned())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<BookingDBResponse>> {
        Ok(self.read().bookings.get(&id).cloned())
    }

    async fn count_overlapping(&self, driveway_id: DrivewayId, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
        Ok(self.read().count_overlapping(driveway_id, start, end))
    }

    async fn begin_booking(&self, driveway_id: DrivewayId) -> Result<Option<Box<dyn BookingUnit>>> {
        let guard = self.driveway_lock(driveway_id).lock_owned().await;

        let Some(driveway) = self.read().driveways.get(&driveway_id).cloned() else {
            return Ok(None);
        };

        Ok(Some(Box::new(InMemoryBookingUnit {
            _guard: guard,
            store: self.clone(),
            driveway,
            pending: Vec::new(),
        })))
    }

    async fn set_payment_intent(&self, id: BookingId, payment_intent_id: &str) -> Result<BookingDBResponse> {
        let mut state = self.write();
        if state.payment_intent_taken(payment_intent_id, Some(id)) {
            return Err(unique_violation("bookings_payment_intent_id_key"));
        }
        let booking = state.bookings.get_mut(&id).ok_or(DbError::NotFound)?;
        booking.payment_intent_id = Some(payment_intent_id.to_string());
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn create_notifications(&self, requests: &[NotificationCreateDBRequest]) -> Result<Vec<NotificationDBResponse>> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(DbError::Other(anyhow::anyhow!("notification storage unavailable")));
        }

        let now = Utc::now();
        let created: Vec<_> = requests
            .iter()
            .map(|request| NotificationDBResponse {
                id: Uuid::new_v4(),
                user_id: request.user_id,
                kind: request.kind,
                title: request.title.clone(),
                message: request.message.clone(),
                booking_id: request.booking_id,
                is_read: false,
                created_at: now,
            })
            .collect();
        self.write().notifications.extend(created.iter().cloned());
        Ok(created)
    }
}

struct InMemoryBookingUnit {
    _guard: OwnedMutexGuard<()>,
    store: InMemoryStore,
    driveway: DrivewayDBResponse,
    pending: Vec<BookingDBResponse>,
}

#[async_trait]
impl BookingUnit for InMemoryBookingUnit {
    fn driveway(&self) -> &DrivewayDBResponse {
        &self.driveway
    }

    async fn count_overlapping(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
        let committed = self.store.read().count_overlapping(self.driveway.id, start, end);
        let uncommitted = self
            .pending
            .iter()
            .filter(|b| b.status.holds_capacity() && overlaps(b.start_time, b.end_time, start, end))
            .count() as i64;
        Ok(committed + uncommitted)
    }

    async fn insert_booking(&mut self, request: &BookingCreateDBRequest) -> Result<BookingDBResponse> {
        if request.end_time <= request.start_time {
            return Err(DbError::CheckViolation {
                constraint: Some("bookings_time_order".to_string()),
                table: Some("bookings".to_string()),
                message: "end_time must be after start_time".to_string(),
            });
        }
        if request.driveway_id != self.driveway.id {
            return Err(DbError::Other(anyhow::anyhow!("booking unit is scoped to another driveway")));
        }
        if let Some(intent) = &request.payment_intent_id {
            let taken_here = self.pending.iter().any(|b| b.payment_intent_id.as_deref() == Some(intent.as_str()));
            if taken_here || self.store.read().payment_intent_taken(intent, None) {
                return Err(unique_violation("bookings_payment_intent_id_key"));
            }
        }

        let now = Utc::now();
        let booking = BookingDBResponse {
            id: request.id,
            driveway_id: request.driveway_id,
            user_id: request.user_id,
            start_time: request.start_time,
            end_time: request.end_time,
            total_price: request.total_price,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_intent_id: request.payment_intent_id.clone(),
            special_requests: request.special_requests.clone(),
            vehicle_info: request.vehicle_info.clone().map(Json),
            created_at: now,
            updated_at: now,
        };
        self.pending.push(booking.clone());
        Ok(booking)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryBookingUnit { _guard, store, pending, .. } = *self;
        let mut state = store.write();
        for booking in pending {
            state.bookings.insert(booking.id, booking);
        }
        Ok(())
    }
}

fn unique_violation(constraint: &str) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        table: Some("bookings".to_string()),
        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{driveway_request, hours_from_now};
    use std::time::Duration;

    fn booking_request(driveway_id: DrivewayId, user_id: UserId, start_h: i64, end_h: i64) -> BookingCreateDBRequest {
        BookingCreateDBRequest {
            id: Uuid::new_v4(),
            driveway_id,
            user_id,
            start_time: hours_from_now(start_h),
            end_time: hours_from_now(end_h),
            total_price: Decimal::new(1000, 2),
            payment_intent_id: None,
            special_requests: None,
            vehicle_info: None,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_rows_are_invisible_until_commit() {
        let store = InMemoryStore::new();
        let owner = store.insert_user("owner@example.com", None);
        let driveway = store.insert_driveway(&driveway_request(owner.id, 1));

        let mut unit = store.begin_booking(driveway.id).await.unwrap().unwrap();
        let request = booking_request(driveway.id, owner.id, 1, 3);
        unit.insert_booking(&request).await.unwrap();
        assert_eq!(unit.count_overlapping(hours_from_now(2), hours_from_now(4)).await.unwrap(), 1);
        assert!(store.get_booking(request.id).await.unwrap().is_none());

        unit.commit().await.unwrap();
        assert!(store.get_booking(request.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_dropped_unit_discards_writes() {
        let store = InMemoryStore::new();
        let owner = store.insert_user("owner@example.com", None);
        let driveway = store.insert_driveway(&driveway_request(owner.id, 1));

        let request = booking_request(driveway.id, owner.id, 1, 3);
        {
            let mut unit = store.begin_booking(driveway.id).await.unwrap().unwrap();
            unit.insert_booking(&request).await.unwrap();
        }

        assert!(store.get_booking(request.id).await.unwrap().is_none());
        assert!(store.bookings_for_driveway(driveway.id).is_empty());
    }

    #[tokio::test]
    async fn test_second_unit_waits_for_first() {
        let store = InMemoryStore::new();
        let owner = store.insert_user("owner@example.com", None);
        let driveway = store.insert_driveway(&driveway_request(owner.id, 1));

        let first = store.begin_booking(driveway.id).await.unwrap().unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), store.begin_booking(driveway.id)).await;
        assert!(blocked.is_err(), "second unit must wait while the first is open");

        first.commit().await.unwrap();
        let second = tokio::time::timeout(Duration::from_millis(500), store.begin_booking(driveway.id)).await;
        assert!(matches!(second, Ok(Ok(Some(_)))));
    }

    #[tokio::test]
    async fn test_units_on_different_driveways_do_not_block() {
        let store = InMemoryStore::new();
        let owner = store.insert_user("owner@example.com", None);
        let a = store.insert_driveway(&driveway_request(owner.id, 1));
        let b = store.insert_driveway(&driveway_request(owner.id, 1));

        let _held = store.begin_booking(a.id).await.unwrap().unwrap();
        let other = tokio::time::timeout(Duration::from_millis(500), store.begin_booking(b.id)).await;
        assert!(matches!(other, Ok(Ok(Some(_)))));
    }

    #[tokio::test]
    async fn test_begin_booking_missing_driveway() {
        let store = InMemoryStore::new();
        assert!(store.begin_booking(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_only_capacity_holding_statuses_are_counted() {
        let store = InMemoryStore::new();
        let owner = store.insert_user("owner@example.com", None);
        let driveway = store.insert_driveway(&driveway_request(owner.id, 5));

        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
            BookingStatus::Expired,
        ] {
            store.seed_booking(driveway.id, owner.id, hours_from_now(1), hours_from_now(3), status);
        }

        let count = store
            .count_overlapping(driveway.id, hours_from_now(2), hours_from_now(4))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_inverted_window() {
        let store = InMemoryStore::new();
        let owner = store.insert_user("owner@example.com", None);
        let driveway = store.insert_driveway(&driveway_request(owner.id, 1));

        let mut unit = store.begin_booking(driveway.id).await.unwrap().unwrap();
        let err = unit.insert_booking(&booking_request(driveway.id, owner.id, 3, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_set_payment_intent() {
        let store = InMemoryStore::new();
        let owner = store.insert_user("owner@example.com", None);
        let driveway = store.insert_driveway(&driveway_request(owner.id, 2));
        let first = store.seed_booking(driveway.id, owner.id, hours_from_now(1), hours_from_now(2), BookingStatus::Pending);
        let second = store.seed_booking(driveway.id, owner.id, hours_from_now(1), hours_from_now(2), BookingStatus::Pending);

        let updated = store.set_payment_intent(first.id, "pi_1").await.unwrap();
        assert_eq!(updated.payment_intent_id.as_deref(), Some("pi_1"));

        let err = store.set_payment_intent(second.id, "pi_1").await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let err = store.set_payment_intent(Uuid::new_v4(), "pi_2").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[tokio::test]
    async fn test_notification_failure_switch() {
        let store = InMemoryStore::new();
        let user = store.insert_user("driver@example.com", None);
        let request = NotificationCreateDBRequest {
            user_id: user.id,
            kind: crate::db::models::notifications::NotificationKind::BookingCreated,
            title: "Booking created".into(),
            message: "ok".into(),
            booking_id: None,
        };

        store.fail_notifications(true);
        assert!(store.create_notifications(std::slice::from_ref(&request)).await.is_err());
        store.fail_notifications(false);
        assert_eq!(store.create_notifications(&[request]).await.unwrap().len(), 1);
        assert_eq!(store.notifications_for_user(user.id).len(), 1);
    }
}
