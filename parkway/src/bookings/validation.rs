//! Booking request validation.
//!
//! The request body is checked as raw JSON so that every problem can be reported at once,
//! instead of stopping at the first field serde would reject.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    db::models::bookings::VehicleInfo,
    errors::{Error, FieldError, Result},
    types::DrivewayId,
};

pub const MAX_SPECIAL_REQUESTS_CHARS: usize = 500;

const DRIVEWAY_ID_KEYS: &[&str] = &["driveway_id", "drivewayId", "resourceId", "resource_id"];
const START_TIME_KEYS: &[&str] = &["start_time", "startTime"];
const END_TIME_KEYS: &[&str] = &["end_time", "endTime"];
const SPECIAL_REQUESTS_KEYS: &[&str] = &["special_requests", "specialRequests"];
const VEHICLE_INFO_KEYS: &[&str] = &["vehicle_info", "vehicleInfo"];

/// A booking request whose fields are well-formed. Business rules are checked later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub driveway_id: DrivewayId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub special_requests: Option<String>,
    pub vehicle_info: Option<VehicleInfo>,
}

/// Validate a raw booking body, collecting every field error.
pub fn validate_booking_request(body: &Value) -> Result<BookingRequest> {
    let Some(object) = body.as_object() else {
        return Err(Error::Validation {
            fields: vec![FieldError::new("body", "must be a JSON object")],
        });
    };

    let mut errors = Vec::new();

    let driveway_id = required_string(object, DRIVEWAY_ID_KEYS, "driveway_id", &mut errors).and_then(|raw| match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.push(FieldError::new("driveway_id", "must be a valid UUID"));
            None
        }
    });
    let start_time = required_timestamp(object, START_TIME_KEYS, "start_time", &mut errors);
    let end_time = required_timestamp(object, END_TIME_KEYS, "end_time", &mut errors);
    let special_requests = optional_special_requests(object, &mut errors);
    let vehicle_info = optional_vehicle_info(object, &mut errors);

    match (driveway_id, start_time, end_time) {
        (Some(driveway_id), Some(start_time), Some(end_time)) if errors.is_empty() => Ok(BookingRequest {
            driveway_id,
            start_time,
            end_time,
            special_requests,
            vehicle_info,
        }),
        _ => Err(Error::Validation { fields: errors }),
    }
}

/// First non-null value under any of the accepted spellings
fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|key| object.get(*key)).find(|value| !value.is_null())
}

fn required_string<'a>(object: &'a Map<String, Value>, keys: &[&str], field: &str, errors: &mut Vec<FieldError>) -> Option<&'a str> {
    match lookup(object, keys) {
        None => {
            errors.push(FieldError::new(field, "is required"));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.push(FieldError::new(field, "is required"));
            None
        }
        Some(Value::String(s)) => Some(s.trim()),
        Some(_) => {
            errors.push(FieldError::new(field, "must be a string"));
            None
        }
    }
}

fn required_timestamp(object: &Map<String, Value>, keys: &[&str], field: &str, errors: &mut Vec<FieldError>) -> Option<DateTime<Utc>> {
    let raw = required_string(object, keys, field, errors)?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(_) => {
            errors.push(FieldError::new(field, "must be an ISO 8601 date-time with timezone"));
            None
        }
    }
}

fn optional_special_requests(object: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<String> {
    match lookup(object, SPECIAL_REQUESTS_KEYS)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.chars().count() > MAX_SPECIAL_REQUESTS_CHARS {
                errors.push(FieldError::new(
                    "special_requests",
                    format!("must be at most {MAX_SPECIAL_REQUESTS_CHARS} characters"),
                ));
                None
            } else if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        _ => {
            errors.push(FieldError::new("special_requests", "must be a string"));
            None
        }
    }
}

fn optional_vehicle_info(object: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<VehicleInfo> {
    let value = lookup(object, VEHICLE_INFO_KEYS)?;
    let Some(vehicle) = value.as_object() else {
        errors.push(FieldError::new("vehicle_info", "must be an object"));
        return None;
    };

    let before = errors.len();
    let make = required_string(vehicle, &["make"], "vehicle_info.make", errors);
    let model = required_string(vehicle, &["model"], "vehicle_info.model", errors);
    let color = required_string(vehicle, &["color", "colour"], "vehicle_info.color", errors);
    let license_plate = required_string(vehicle, &["license_plate", "licensePlate"], "vehicle_info.license_plate", errors);

    if errors.len() > before {
        return None;
    }

    Some(VehicleInfo {
        make: make?.to_string(),
        model: model?.to_string(),
        color: color?.to_string(),
        license_plate: license_plate?.to_string(),
    })
}
