//! Transactional booking writer.
//!
//! Re-checks capacity and inserts the booking inside one [`BookingUnit`], so two requests for
//! the same driveway can never both pass the count before either has inserted. When a payment
//! provider is configured the authorization is created inside the unit as well, keeping the
//! row and the authorization metadata in agreement.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use crate::{
    bookings::availability::check_capacity,
    db::models::bookings::{BookingCreateDBRequest, BookingDBResponse, VehicleInfo},
    errors::{Error, Result},
    payment_providers::{AuthorizationRequest, PaymentProvider, to_minor_units},
    storage::BookingStore,
    types::{BookingId, DrivewayId, UserId, abbrev_uuid},
};

/// Everything needed to write a booking that passed validation, availability and pricing
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub id: BookingId,
    pub driveway_id: DrivewayId,
    pub user_id: UserId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_price: Decimal,
    pub special_requests: Option<String>,
    pub vehicle_info: Option<VehicleInfo>,
}

/// A committed booking and, when one was created, its authorization's client secret
#[derive(Debug, Clone)]
pub struct WrittenBooking {
    pub booking: BookingDBResponse,
    pub client_secret: Option<String>,
}

pub struct BookingWriter {
    store: Arc<dyn BookingStore>,
    payments: Option<Arc<dyn PaymentProvider>>,
    currency: String,
}

impl BookingWriter {
    pub fn new(store: Arc<dyn BookingStore>, payments: Option<Arc<dyn PaymentProvider>>, currency: impl Into<String>) -> Self {
        Self {
            store,
            payments,
            currency: currency.into(),
        }
    }

    /// Write the draft atomically.
    ///
    /// Nothing is written if the driveway is full, gone, or stopped accepting bookings since
    /// the optimistic check. A failing payment processor does not abort the write.
    #[instrument(skip_all, fields(booking_id = %abbrev_uuid(&draft.id), driveway_id = %abbrev_uuid(&draft.driveway_id)), err)]
    pub async fn write(&self, draft: BookingDraft) -> Result<WrittenBooking> {
        let Some(mut unit) = self.store.begin_booking(draft.driveway_id).await? else {
            return Err(Error::NotFound {
                resource: "Driveway".to_string(),
                id: draft.driveway_id.to_string(),
            });
        };

        let driveway = unit.driveway().clone();
        if !driveway.accepts_bookings() {
            return Err(Error::ResourceUnavailable {
                id: driveway.id.to_string(),
            });
        }

        let overlapping = unit.count_overlapping(draft.start_time, draft.end_time).await?;
        check_capacity(&driveway, overlapping)?;

        let authorization = match &self.payments {
            Some(provider) => self.authorize(provider.as_ref(), &draft).await,
            None => None,
        };

        let request = BookingCreateDBRequest {
            id: draft.id,
            driveway_id: draft.driveway_id,
            user_id: draft.user_id,
            start_time: draft.start_time,
            end_time: draft.end_time,
            total_price: draft.total_price,
            payment_intent_id: authorization.as_ref().map(|(id, _)| id.clone()),
            special_requests: draft.special_requests,
            vehicle_info: draft.vehicle_info,
        };

        let booking = unit.insert_booking(&request).await?;
        unit.commit().await?;

        tracing::info!(
            "Booking {} written ({} of {} slots now taken)",
            booking.id,
            overlapping + 1,
            driveway.capacity
        );

        Ok(WrittenBooking {
            booking,
            client_secret: authorization.map(|(_, secret)| secret),
        })
    }

    /// Create the authorization for a draft; failures are logged and yield `None`.
    async fn authorize(&self, provider: &dyn PaymentProvider, draft: &BookingDraft) -> Option<(String, String)> {
        let amount = match to_minor_units(draft.total_price) {
            Ok(amount) => amount,
            Err(e) => {
                tracing::error!("Cannot authorize booking {}: {}", draft.id, e);
                return None;
            }
        };

        let request = AuthorizationRequest {
            amount,
            currency: self.currency.clone(),
            booking_id: draft.id,
            driveway_id: draft.driveway_id,
            user_id: draft.user_id,
        };

        match provider.create_authorization(&request).await {
            Ok(authorization) => Some((authorization.id, authorization.client_secret)),
            Err(e) => {
                tracing::warn!("Payment authorization failed for booking {}, continuing without one: {}", draft.id, e);
                None
            }
        }
    }
}
