//! Booking creation workflow.
//!
//! [`BookingService::create_booking`] is the only way bookings are created. A request flows
//! through these stages:
//!
//! 1. [`validation`]: shape of the JSON body, every field error reported together
//! 2. [`availability`]: business preconditions and an optimistic capacity check
//! 3. [`pricing`]: total for the window at the driveway's hourly rate
//! 4. [`writer`]: authoritative capacity check, payment authorization and insert, atomically
//! 5. [`crate::notifications`]: best-effort notifications and confirmation email
//!
//! Rejections at any stage leave no booking behind.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    config::BookingConfig,
    db::models::{bookings::BookingDBResponse, driveways::DrivewayDBResponse, users::UserDBResponse},
    errors::{Error, Result},
    notifications::Notifier,
    payment_providers::PaymentProvider,
    storage::BookingStore,
    types::{BookingId, DrivewayId, UserId, abbrev_uuid},
};

pub mod availability;
pub mod pricing;
pub mod validation;
pub mod writer;

use availability::{Availability, check_availability};
use validation::validate_booking_request;
use writer::{BookingDraft, BookingWriter};

/// A booking with the driveway and owner it belongs to
#[derive(Debug, Clone)]
pub struct BookingDetails {
    pub booking: BookingDBResponse,
    pub driveway: DrivewayDBResponse,
    pub owner: Option<UserDBResponse>,
    /// Present only on creation, when an authorization was created for the booking
    pub client_secret: Option<String>,
}

/// Rules the workflow enforces, resolved from [`BookingConfig`]
#[derive(Debug, Clone)]
pub struct BookingRules {
    pub max_duration: TimeDelta,
    pub currency: String,
    pub require_payment: bool,
}

impl From<&BookingConfig> for BookingRules {
    fn from(config: &BookingConfig) -> Self {
        Self {
            max_duration: TimeDelta::from_std(config.max_duration).unwrap_or(TimeDelta::MAX),
            currency: config.currency.clone(),
            require_payment: config.require_payment,
        }
    }
}

impl Default for BookingRules {
    fn default() -> Self {
        Self::from(&BookingConfig::default())
    }
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    payments: Option<Arc<dyn PaymentProvider>>,
    writer: Arc<BookingWriter>,
    notifier: Notifier,
    rules: BookingRules,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, payments: Option<Arc<dyn PaymentProvider>>, notifier: Notifier, rules: BookingRules) -> Self {
        let writer = Arc::new(BookingWriter::new(store.clone(), payments.clone(), rules.currency.clone()));
        Self {
            store,
            payments,
            writer,
            notifier,
            rules,
        }
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    /// Create a booking for `requester` from a raw request body.
    #[instrument(skip(self, body), fields(requester = %abbrev_uuid(&requester)), err)]
    pub async fn create_booking(&self, requester: UserId, body: &Value) -> Result<BookingDetails> {
        let result = self.create_booking_at(requester, body, Utc::now()).await;
        metrics::counter!("parkway_bookings_total", "outcome" => outcome_label(&result)).increment(1);
        result
    }

    async fn create_booking_at(&self, requester_id: UserId, body: &Value, now: DateTime<Utc>) -> Result<BookingDetails> {
        let request = validate_booking_request(body)?;

        if self.rules.require_payment && self.payments.is_none() {
            return Err(Error::PaymentNotConfigured);
        }

        let requester = self.store.get_user(requester_id).await?.ok_or(Error::Unauthenticated {
            message: Some("Unknown user".to_string()),
        })?;

        let availability = check_availability(
            self.store.as_ref(),
            requester.id,
            request.driveway_id,
            request.start_time,
            request.end_time,
            now,
            self.rules.max_duration,
        )
        .await?;
        availability.ensure_capacity()?;

        let total_price = pricing::calculate_total(request.start_time, request.end_time, availability.driveway.price_per_hour)?;

        let draft = BookingDraft {
            id: Uuid::new_v4(),
            driveway_id: request.driveway_id,
            user_id: requester.id,
            start_time: request.start_time,
            end_time: request.end_time,
            total_price,
            special_requests: request.special_requests,
            vehicle_info: request.vehicle_info,
        };
        let written = self.writer.write(draft).await?;

        let driveway = availability.driveway;
        self.notifier.booking_created(&written.booking, &driveway, &requester).await;

        let owner = self.lookup_owner(&driveway).await;
        Ok(BookingDetails {
            booking: written.booking,
            driveway,
            owner,
            client_secret: written.client_secret,
        })
    }

    /// Fetch a booking visible to `caller`: its requester or the driveway's owner.
    #[instrument(skip(self), fields(booking_id = %abbrev_uuid(&booking_id)), err)]
    pub async fn get_booking(&self, caller: UserId, booking_id: BookingId) -> Result<BookingDetails> {
        let not_found = || Error::NotFound {
            resource: "Booking".to_string(),
            id: booking_id.to_string(),
        };

        let booking = self.store.get_booking(booking_id).await?.ok_or_else(not_found)?;
        let driveway = self.store.get_driveway(booking.driveway_id).await?.ok_or_else(not_found)?;

        if caller != booking.user_id && caller != driveway.owner_id {
            return Err(Error::Forbidden {
                resource: "Booking".to_string(),
                id: booking_id.to_string(),
            });
        }

        let owner = self.lookup_owner(&driveway).await;
        Ok(BookingDetails {
            booking,
            driveway,
            owner,
            client_secret: None,
        })
    }

    /// Run the booking checks for a window without writing anything.
    ///
    /// A full driveway is reported through [`Availability::is_available`] rather than as an error.
    pub async fn check_availability(
        &self,
        requester: UserId,
        driveway_id: DrivewayId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Availability> {
        check_availability(self.store.as_ref(), requester, driveway_id, start, end, Utc::now(), self.rules.max_duration).await
    }

    async fn lookup_owner(&self, driveway: &DrivewayDBResponse) -> Option<UserDBResponse> {
        match self.store.get_user(driveway.owner_id).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load driveway owner");
                None
            }
        }
    }
}

fn outcome_label(result: &Result<BookingDetails>) -> &'static str {
    match result {
        Ok(_) => "created",
        Err(Error::CapacityExceeded { .. }) => "capacity_exceeded",
        Err(Error::Validation { .. }) => "invalid",
        Err(e) if e.status_code().is_client_error() => "rejected",
        Err(_) => "error",
    }
}
