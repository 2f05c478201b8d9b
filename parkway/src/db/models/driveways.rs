use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::types::{DrivewayId, UserId};

/// Database request for listing a new driveway
#[derive(Debug, Clone)]
pub struct DrivewayCreateDBRequest {
    pub owner_id: UserId,
    pub title: String,
    pub address: String,
    pub price_per_hour: Decimal,
    pub capacity: i32,
    pub is_active: bool,
    pub is_available: bool,
}

/// Database response for driveway operations
#[derive(Debug, Clone, FromRow)]
pub struct DrivewayDBResponse {
    pub id: DrivewayId,
    pub owner_id: UserId,
    pub title: String,
    pub address: String,
    pub is_active: bool,
    pub is_available: bool,
    pub price_per_hour: Decimal,
    /// Number of bookings allowed to overlap at any instant; always >= 1
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DrivewayDBResponse {
    /// Whether the owner currently accepts new bookings on this driveway
    pub fn accepts_bookings(&self) -> bool {
        self.is_active && self.is_available
    }
}
