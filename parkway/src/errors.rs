use crate::db::errors::DbError;
use crate::payment_providers::PaymentError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed or missing request fields. Every violated field is listed.
    #[error("Validation failed: {}", format_fields(.fields))]
    Validation { fields: Vec<FieldError> },

    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Caller is not entitled to the referenced booking or driveway
    #[error("Access to {resource} {id} denied")]
    Forbidden { resource: String, id: String },

    /// Business rule violation on the booking itself (self-booking)
    #[error("{message}")]
    InvalidBooking { message: String },

    /// Start time is not in the future
    #[error("{message}")]
    InvalidTime { message: String },

    /// End time does not come after start time
    #[error("{message}")]
    InvalidTimeRange { message: String },

    /// Booking is longer than the configured maximum
    #[error("{message}")]
    InvalidDuration { message: String },

    /// Driveway is inactive or switched to unavailable by its owner
    #[error("Driveway {id} is not accepting bookings")]
    ResourceUnavailable { id: String },

    /// Driveway already holds `capacity` overlapping bookings for the window
    #[error("Driveway {id} is fully booked for the requested window (capacity {capacity})")]
    CapacityExceeded { id: String, capacity: i32 },

    /// No payment processor configured
    #[error("Payment processing is not configured")]
    PaymentNotConfigured,

    /// External payment processor failure
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// Outcome of a coalesced call, shared between every caller that joined it
    #[error(transparent)]
    Shared(Arc<Error>),
}

/// A single violated request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn format_fields(fields: &[FieldError]) -> String {
    fields.iter().map(|f| format!("{}: {}", f.field, f.message)).collect::<Vec<_>>().join("; ")
}

/// JSON envelope returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Stable machine-readable code for client-side branching
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl Error {
    /// Recover an owned error from a coalesced outcome, wrapping only when it is still shared
    pub fn from_shared(err: Arc<Error>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(Error::Shared)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Shared(inner) => inner.status_code(),
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::InvalidBooking { .. }
            | Error::InvalidTime { .. }
            | Error::InvalidTimeRange { .. }
            | Error::InvalidDuration { .. }
            | Error::ResourceUnavailable { .. } => StatusCode::BAD_REQUEST,
            Error::CapacityExceeded { .. } => StatusCode::CONFLICT,
            Error::PaymentNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Error::Payment(err) => match err {
                PaymentError::CardDeclined { .. } | PaymentError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
                PaymentError::ProviderApi(_) | PaymentError::Transport(_) | PaymentError::InvalidData(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Error::Database(DbError::NotFound) => StatusCode::NOT_FOUND,
            Error::Database(_) | Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::Shared(inner) => inner.code(),
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::Unauthenticated { .. } => "UNAUTHENTICATED",
            Error::NotFound { .. } | Error::Database(DbError::NotFound) => "NOT_FOUND",
            Error::Forbidden { .. } => "FORBIDDEN",
            Error::InvalidBooking { .. } => "INVALID_BOOKING",
            Error::InvalidTime { .. } => "INVALID_TIME",
            Error::InvalidTimeRange { .. } => "INVALID_TIME_RANGE",
            Error::InvalidDuration { .. } => "INVALID_DURATION",
            Error::ResourceUnavailable { .. } => "DRIVEWAY_UNAVAILABLE",
            Error::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Error::PaymentNotConfigured => "PAYMENT_NOT_CONFIGURED",
            Error::Payment(PaymentError::CardDeclined { .. }) => "PAYMENT_CARD_ERROR",
            Error::Payment(PaymentError::InvalidRequest { .. }) => "PAYMENT_INVALID_REQUEST",
            Error::Payment(_) => "PAYMENT_PROCESSOR_ERROR",
            Error::Database(_) | Error::Internal { .. } | Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Shared(inner) => inner.user_message(),
            Error::Validation { fields } => format!("Invalid request: {}", format_fields(fields)),
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Forbidden { resource, .. } => format!("You do not have access to this {}", resource.to_lowercase()),
            Error::InvalidBooking { message }
            | Error::InvalidTime { message }
            | Error::InvalidTimeRange { message }
            | Error::InvalidDuration { message } => message.clone(),
            Error::ResourceUnavailable { .. } => "This driveway is not currently available for booking".to_string(),
            Error::CapacityExceeded { .. } => "This driveway is fully booked for the selected time".to_string(),
            Error::PaymentNotConfigured => "Payments are not available right now. Please try again later.".to_string(),
            Error::Payment(err) => match err {
                PaymentError::CardDeclined { message, .. } => message
                    .clone()
                    .unwrap_or_else(|| "Your card was declined. Please use a different payment method.".to_string()),
                PaymentError::InvalidRequest { .. } => {
                    "The payment request was invalid. Please check the booking details and try again.".to_string()
                }
                _ => "Payment processing failed. Please try again later.".to_string(),
            },
            Error::Database(DbError::NotFound) => "Resource not found".to_string(),
            Error::Database(_) | Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            success: false,
            message: self.user_message(),
            status_code: self.status_code().as_u16(),
            code: self.code().to_string(),
            errors: self.field_errors().to_vec(),
        }
    }

    fn field_errors(&self) -> &[FieldError] {
        match self {
            Error::Validation { fields } => fields,
            Error::Shared(inner) => inner.field_errors(),
            _ => &[],
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        let inner = match &self {
            Error::Shared(inner) => inner.as_ref(),
            other => other,
        };
        match inner {
            Error::Database(DbError::NotFound) => {
                tracing::debug!("Client error: {}", self);
            }
            Error::Database(_) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Payment(_) | Error::PaymentNotConfigured => {
                tracing::warn!("Payment error: {}", self);
            }
            Error::CapacityExceeded { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::Forbidden { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, axum::response::Json(self.body())).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
