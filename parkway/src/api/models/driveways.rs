//! API models for driveways.

use crate::db::models::driveways::DrivewayDBResponse;
use crate::types::DrivewayId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Driveway fields embedded in booking responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrivewaySummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: DrivewayId,
    pub title: String,
    pub address: String,
    /// Decimal string, e.g. "10.00"
    #[schema(value_type = String)]
    pub price_per_hour: Decimal,
    pub capacity: i32,
}

impl From<DrivewayDBResponse> for DrivewaySummary {
    fn from(driveway: DrivewayDBResponse) -> Self {
        Self {
            id: driveway.id,
            title: driveway.title,
            address: driveway.address,
            price_per_hour: driveway.price_per_hour,
            capacity: driveway.capacity,
        }
    }
}

/// Window to check, as RFC 3339 timestamps
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}
