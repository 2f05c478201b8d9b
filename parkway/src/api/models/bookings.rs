//! API models for bookings.

use crate::{
    api::models::{driveways::DrivewaySummary, users::UserSummary},
    bookings::BookingDetails,
    db::models::bookings::{BookingStatus, PaymentStatus, VehicleInfo},
    types::{BookingId, DrivewayId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Success envelope shared by the booking endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: BookingId,
    #[schema(value_type = String, format = "uuid")]
    pub driveway_id: DrivewayId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Decimal string with two fractional digits
    #[schema(value_type = String)]
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub special_requests: Option<String>,
    pub vehicle_info: Option<VehicleInfo>,
    pub created_at: DateTime<Utc>,
    pub driveway: DrivewaySummary,
    /// Missing only if the owner's account can no longer be loaded
    pub owner: Option<UserSummary>,
    /// Returned once, on creation, when an authorization was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl From<BookingDetails> for BookingResponse {
    fn from(details: BookingDetails) -> Self {
        let BookingDetails {
            booking,
            driveway,
            owner,
            client_secret,
        } = details;

        Self {
            id: booking.id,
            driveway_id: booking.driveway_id,
            user_id: booking.user_id,
            start_time: booking.start_time,
            end_time: booking.end_time,
            total_price: booking.total_price,
            status: booking.status,
            payment_status: booking.payment_status,
            payment_intent_id: booking.payment_intent_id,
            special_requests: booking.special_requests,
            vehicle_info: booking.vehicle_info.map(|json| json.0),
            created_at: booking.created_at,
            driveway: driveway.into(),
            owner: owner.map(UserSummary::from),
            client_secret,
        }
    }
}

/// Body of `POST /bookings`. Accepted loosely and checked field by field, so the schema
/// documents the canonical names only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingCreate {
    #[schema(value_type = String, format = "uuid")]
    pub driveway_id: DrivewayId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub special_requests: Option<String>,
    pub vehicle_info: Option<VehicleInfo>,
}
