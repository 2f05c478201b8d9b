use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::ToSchema;

use crate::types::{BookingId, DrivewayId, UserId};

/// Booking lifecycle status
///
/// Only `pending` and `confirmed` bookings hold capacity on a driveway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Expired,
}

impl BookingStatus {
    pub fn holds_capacity(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Structured vehicle descriptor; all four fields are required together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VehicleInfo {
    pub make: String,
    pub model: String,
    pub color: String,
    pub license_plate: String,
}

/// Database request for inserting a booking inside the booking transaction.
///
/// The id is generated by the caller so payment metadata can reference it before the row exists.
#[derive(Debug, Clone)]
pub struct BookingCreateDBRequest {
    pub id: BookingId,
    pub driveway_id: DrivewayId,
    pub user_id: UserId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_price: Decimal,
    pub payment_intent_id: Option<String>,
    pub special_requests: Option<String>,
    pub vehicle_info: Option<VehicleInfo>,
}

/// Database response for booking operations
#[derive(Debug, Clone, FromRow)]
pub struct BookingDBResponse {
    pub id: BookingId,
    pub driveway_id: DrivewayId,
    pub user_id: UserId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub special_requests: Option<String>,
    pub vehicle_info: Option<Json<VehicleInfo>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_and_confirmed_hold_capacity() {
        assert!(BookingStatus::Pending.holds_capacity());
        assert!(BookingStatus::Confirmed.holds_capacity());
        assert!(!BookingStatus::Cancelled.holds_capacity());
        assert!(!BookingStatus::Completed.holds_capacity());
        assert!(!BookingStatus::Expired.holds_capacity());
    }
}
