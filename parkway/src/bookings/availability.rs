//! Availability and capacity checks.
//!
//! [`check_preconditions`] applies the business rules that do not depend on other bookings.
//! [`check_availability`] adds an optimistic overlap count taken outside any atomic unit; the
//! count is repeated authoritatively by the writer before anything is inserted.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    db::models::driveways::DrivewayDBResponse,
    errors::{Error, Result},
    storage::BookingStore,
    types::{DrivewayId, UserId},
};

/// Check the booking rules for `driveway`, in order.
///
/// Start must lie strictly after `now`; the window must be non-empty and no longer than
/// `max_duration`.
pub fn check_preconditions(
    driveway: &DrivewayDBResponse,
    requester: UserId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
    max_duration: TimeDelta,
) -> Result<()> {
    if !driveway.accepts_bookings() {
        return Err(Error::ResourceUnavailable {
            id: driveway.id.to_string(),
        });
    }

    if driveway.owner_id == requester {
        return Err(Error::InvalidBooking {
            message: "You cannot book your own driveway".to_string(),
        });
    }

    if start <= now {
        return Err(Error::InvalidTime {
            message: "Start time must be in the future".to_string(),
        });
    }

    if end <= start {
        return Err(Error::InvalidTimeRange {
            message: "End time must be after start time".to_string(),
        });
    }

    if end - start > max_duration {
        return Err(Error::InvalidDuration {
            message: format!("Booking duration cannot exceed {}", describe_duration(max_duration)),
        });
    }

    Ok(())
}

/// Fail with `CapacityExceeded` once `overlapping` bookings fill the driveway.
pub fn check_capacity(driveway: &DrivewayDBResponse, overlapping: i64) -> Result<()> {
    if overlapping >= i64::from(driveway.capacity) {
        return Err(Error::CapacityExceeded {
            id: driveway.id.to_string(),
            capacity: driveway.capacity,
        });
    }
    Ok(())
}

/// Result of a successful precondition check plus the optimistic overlap count
#[derive(Debug, Clone)]
pub struct Availability {
    pub driveway: DrivewayDBResponse,
    pub overlapping: i64,
}

impl Availability {
    pub fn remaining(&self) -> i64 {
        (i64::from(self.driveway.capacity) - self.overlapping).max(0)
    }

    pub fn is_available(&self) -> bool {
        self.remaining() > 0
    }

    pub fn ensure_capacity(&self) -> Result<()> {
        check_capacity(&self.driveway, self.overlapping)
    }

    pub fn summary(&self) -> AvailabilitySummary {
        AvailabilitySummary {
            available: self.is_available(),
            overlapping: self.overlapping,
            capacity: self.driveway.capacity,
            remaining: self.remaining(),
        }
    }
}

/// Availability of a driveway for one window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AvailabilitySummary {
    pub available: bool,
    /// Pending and confirmed bookings overlapping the window
    pub overlapping: i64,
    pub capacity: i32,
    pub remaining: i64,
}

/// Look up the driveway, apply the preconditions and count overlapping bookings.
#[tracing::instrument(skip(store), err)]
pub async fn check_availability(
    store: &dyn BookingStore,
    requester: UserId,
    driveway_id: DrivewayId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
    max_duration: TimeDelta,
) -> Result<Availability> {
    let driveway = store.get_driveway(driveway_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Driveway".to_string(),
        id: driveway_id.to_string(),
    })?;

    check_preconditions(&driveway, requester, start, end, now, max_duration)?;

    let overlapping = store.count_overlapping(driveway.id, start, end).await?;
    Ok(Availability { driveway, overlapping })
}

fn describe_duration(duration: TimeDelta) -> String {
    let hours = duration.num_hours();
    let plural = |n: i64, unit: &str| if n == 1 { format!("1 {unit}") } else { format!("{n} {unit}s") };

    if hours > 0 && duration == TimeDelta::hours(hours) {
        if hours % 24 == 0 {
            plural(hours / 24, "day")
        } else {
            plural(hours, "hour")
        }
    } else {
        plural(duration.num_minutes(), "minute")
    }
}
