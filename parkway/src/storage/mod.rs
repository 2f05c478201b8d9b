//! Storage abstraction for the booking workflow.
//!
//! [`BookingStore`] exposes the point lookups, counts and bulk inserts the workflow needs,
//! plus [`BookingStore::begin_booking`], which opens the atomic unit used by the
//! transactional writer. While a [`BookingUnit`] is open it holds exclusive booking rights on
//! its driveway: no other unit for the same driveway can count or insert until it commits or
//! is dropped. Dropping a unit without committing discards everything it wrote.
//!
//! Two implementations exist:
//!
//! - [`postgres::PostgresStore`]: production store; the unit is a Postgres transaction that
//!   holds a `FOR UPDATE` row lock on the driveway.
//! - [`in_memory::InMemoryStore`]: process-local store with a per-driveway async mutex, used
//!   by tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    db::{
        errors::Result,
        models::{
            bookings::{BookingCreateDBRequest, BookingDBResponse},
            driveways::DrivewayDBResponse,
            notifications::{NotificationCreateDBRequest, NotificationDBResponse},
            users::UserDBResponse,
        },
    },
    types::{BookingId, DrivewayId, UserId},
};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Persistence operations used by the booking workflow.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    async fn get_driveway(&self, id: DrivewayId) -> Result<Option<DrivewayDBResponse>>;

    async fn get_booking(&self, id: BookingId) -> Result<Option<BookingDBResponse>>;

    /// Count capacity-holding bookings overlapping `[start, end)` outside any unit.
    ///
    /// The result may be stale by the time it is used; it only serves the optimistic check.
    async fn count_overlapping(&self, driveway_id: DrivewayId, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64>;

    /// Open the atomic booking unit for a driveway.
    ///
    /// Waits until no other unit is open for the same driveway. Returns `None` if the driveway
    /// no longer exists.
    async fn begin_booking(&self, driveway_id: DrivewayId) -> Result<Option<Box<dyn BookingUnit>>>;

    async fn set_payment_intent(&self, id: BookingId, payment_intent_id: &str) -> Result<BookingDBResponse>;

    async fn create_notifications(&self, requests: &[NotificationCreateDBRequest]) -> Result<Vec<NotificationDBResponse>>;
}

/// An open atomic unit with exclusive booking rights on one driveway.
#[async_trait]
pub trait BookingUnit: Send {
    /// The driveway as read under the lock
    fn driveway(&self) -> &DrivewayDBResponse;

    /// Authoritative overlap count, including rows inserted earlier in this unit
    async fn count_overlapping(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64>;

    async fn insert_booking(&mut self, request: &BookingCreateDBRequest) -> Result<BookingDBResponse>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)` share at least one instant.
pub fn overlaps(a_start: DateTime<Utc>, a_end: DateTime<Utc>, b_start: DateTime<Utc>, b_end: DateTime<Utc>) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        assert!(!overlaps(at(10, 0), at(12, 0), at(12, 0), at(14, 0)));
        assert!(!overlaps(at(12, 0), at(14, 0), at(10, 0), at(12, 0)));
    }

    #[test]
    fn test_one_instant_of_shared_time_overlaps() {
        let a_end = at(12, 0);
        let b_start = a_end - Duration::milliseconds(1);
        assert!(overlaps(at(10, 0), a_end, b_start, at(14, 0)));
    }

    #[test]
    fn test_containment_and_identity_overlap() {
        assert!(overlaps(at(10, 0), at(14, 0), at(11, 0), at(12, 0)));
        assert!(overlaps(at(11, 0), at(12, 0), at(10, 0), at(14, 0)));
        assert!(overlaps(at(10, 0), at(12, 0), at(10, 0), at(12, 0)));
    }

    #[test]
    fn test_disjoint_intervals() {
        assert!(!overlaps(at(8, 0), at(9, 0), at(10, 0), at(11, 0)));
    }
}
