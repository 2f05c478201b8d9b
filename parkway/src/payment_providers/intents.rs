//! Payment intent bridge for existing bookings.
//!
//! Clients that lost the client secret returned at booking time (or whose booking was written
//! without one because the processor was down) call [`PaymentIntentBridge::ensure_for_booking`].
//! A stored authorization is reused when the processor still reports the booking's amount;
//! otherwise a fresh one is created and its id persisted on the booking.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    db::models::bookings::BookingDBResponse,
    errors::{Error, Result},
    payment_providers::{AuthorizationRequest, PaymentProvider, coalesce::SingleFlight, to_minor_units},
    storage::BookingStore,
    types::{BookingId, UserId, abbrev_uuid},
};

/// Authorization details handed to the client for confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaymentIntentDetails {
    pub payment_intent_id: String,
    pub client_secret: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    /// Whether the stored authorization was returned instead of creating a new one
    pub reused: bool,
}

type Outcome = std::result::Result<PaymentIntentDetails, Arc<Error>>;

#[derive(Clone)]
pub struct PaymentIntentBridge {
    store: Arc<dyn BookingStore>,
    provider: Option<Arc<dyn PaymentProvider>>,
    currency: String,
    flights: Arc<SingleFlight<BookingId, Outcome>>,
}

impl PaymentIntentBridge {
    pub fn new(store: Arc<dyn BookingStore>, provider: Option<Arc<dyn PaymentProvider>>, currency: impl Into<String>) -> Self {
        Self {
            store,
            provider,
            currency: currency.into(),
            flights: Arc::new(SingleFlight::new()),
        }
    }

    /// Return a usable authorization for the booking, creating one if needed.
    ///
    /// Concurrent calls for the same booking share a single round of processor calls.
    #[instrument(skip(self), fields(booking_id = %abbrev_uuid(&booking_id), caller = %abbrev_uuid(&caller)), err)]
    pub async fn ensure_for_booking(&self, caller: UserId, booking_id: BookingId) -> Result<PaymentIntentDetails> {
        let booking = self.load_booking(booking_id).await?;
        if booking.user_id != caller {
            return Err(Error::Forbidden {
                resource: "Booking".to_string(),
                id: booking_id.to_string(),
            });
        }

        let provider = self.provider.clone().ok_or(Error::PaymentNotConfigured)?;

        let bridge = self.clone();
        self.flights
            .run(booking_id, move || async move { bridge.reconcile(provider, booking_id).await.map_err(Arc::new) })
            .await
            .map_err(Error::from_shared)
    }

    async fn load_booking(&self, booking_id: BookingId) -> Result<BookingDBResponse> {
        self.store.get_booking(booking_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Booking".to_string(),
            id: booking_id.to_string(),
        })
    }

    async fn reconcile(&self, provider: Arc<dyn PaymentProvider>, booking_id: BookingId) -> Result<PaymentIntentDetails> {
        // Re-read inside the flight so a previous flight's persisted id is seen
        let booking = self.load_booking(booking_id).await?;
        let amount = to_minor_units(booking.total_price)?;

        if let Some(existing_id) = booking.payment_intent_id.as_deref() {
            match provider.retrieve_authorization(existing_id).await {
                Ok(existing) if existing.amount == amount && existing.currency.eq_ignore_ascii_case(&self.currency) => {
                    tracing::debug!("Reusing payment intent {}", existing.id);
                    return Ok(PaymentIntentDetails {
                        payment_intent_id: existing.id,
                        client_secret: existing.client_secret,
                        amount: existing.amount,
                        currency: existing.currency,
                        reused: true,
                    });
                }
                Ok(existing) => {
                    tracing::warn!(
                        "Payment intent {} has amount {} {} but booking total is {} {}; creating a new one",
                        existing.id,
                        existing.amount,
                        existing.currency,
                        amount,
                        self.currency
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to retrieve payment intent {}: {}; creating a new one", existing_id, e);
                }
            }
        }

        let request = AuthorizationRequest {
            amount,
            currency: self.currency.clone(),
            booking_id: booking.id,
            driveway_id: booking.driveway_id,
            user_id: booking.user_id,
        };
        let created = provider.create_authorization(&request).await?;
        self.store.set_payment_intent(booking.id, &created.id).await?;
        tracing::info!("Attached payment intent {} to booking {}", created.id, booking.id);

        Ok(PaymentIntentDetails {
            payment_intent_id: created.id,
            client_secret: created.client_secret,
            amount: created.amount,
            currency: created.currency,
            reused: false,
        })
    }
}
