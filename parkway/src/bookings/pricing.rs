//! Booking price calculation.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::{Error, FieldError, Result};

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Total price for `[start, end)` at `hourly_rate`, rounded to cents (half away from zero).
///
/// Partial hours are charged pro rata to the millisecond.
pub fn calculate_total(start: DateTime<Utc>, end: DateTime<Utc>, hourly_rate: Decimal) -> Result<Decimal> {
    if end < start {
        return Err(Error::InvalidTimeRange {
            message: "End time must be after start time".to_string(),
        });
    }
    if hourly_rate.is_sign_negative() && !hourly_rate.is_zero() {
        return Err(Error::Validation {
            fields: vec![FieldError::new("price_per_hour", "must not be negative")],
        });
    }

    let millis = Decimal::from((end - start).num_milliseconds());
    let total = millis
        .checked_mul(hourly_rate)
        .and_then(|amount| amount.checked_div(Decimal::from(MILLIS_PER_HOUR)))
        .ok_or_else(|| Error::Validation {
            fields: vec![FieldError::new("price_per_hour", "is too large")],
        })?;

    let mut total = total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    total.rescale(2);
    Ok(total)
}
