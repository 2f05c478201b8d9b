//! Payment provider abstraction layer
//!
//! This module defines the `PaymentProvider` trait which abstracts payment authorization
//! across processors. A booking reserves its amount with [`PaymentProvider::create_authorization`]
//! and the client confirms it with the returned client secret.
//!
//! - [`stripe`]: Stripe PaymentIntents over the REST API
//! - [`dummy`]: in-process provider for development
//! - [`intents`]: the bridge that returns (or re-creates) the authorization for an existing booking
//! - [`coalesce`]: single-flight primitive the bridge uses to merge concurrent calls

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::{
    config::PaymentConfig,
    types::{BookingId, DrivewayId, UserId},
};

pub mod coalesce;
pub mod dummy;
pub mod intents;
pub mod stripe;

/// Create a payment provider from configuration
///
/// This is the single point where we convert config into provider instances.
/// Adding a new provider requires adding a match arm here.
pub fn create_provider(config: PaymentConfig) -> Result<Arc<dyn PaymentProvider>> {
    Ok(match config {
        PaymentConfig::Stripe(stripe_config) => Arc::new(stripe::StripeProvider::try_from(stripe_config)?),
        PaymentConfig::Dummy(dummy_config) => Arc::new(dummy::DummyProvider::from(dummy_config)),
    })
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The processor refused the card
    #[error("Card declined: {}", .message.as_deref().unwrap_or("no reason given"))]
    CardDeclined {
        message: Option<String>,
        decline_code: Option<String>,
    },

    /// The processor rejected the request parameters (amount, currency, ...)
    #[error("Invalid payment request: {message}")]
    InvalidRequest { message: String },

    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    /// Network failure or timeout talking to the processor
    #[error("Payment provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid payment data: {0}")]
    InvalidData(String),
}

/// What to authorize. `amount` is in minor currency units (cents).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub amount: i64,
    pub currency: String,
    pub booking_id: BookingId,
    pub driveway_id: DrivewayId,
    pub user_id: UserId,
}

impl AuthorizationRequest {
    /// Metadata attached to the authorization so it can be traced back to the booking
    pub fn metadata(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("booking_id", self.booking_id.to_string()),
            ("driveway_id", self.driveway_id.to_string()),
            ("user_id", self.user_id.to_string()),
        ])
    }

    /// Key that makes retries of the same authorization safe at the processor.
    ///
    /// Includes the amount so that a re-created authorization for a changed total is not
    /// collapsed onto the old one.
    pub fn idempotency_key(&self) -> String {
        format!("booking-{}-{}-{}", self.booking_id, self.amount, self.currency)
    }
}

/// An authorization as reported by the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAuthorization {
    pub id: String,
    pub client_secret: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
}

/// Abstract payment provider interface
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Reserve `request.amount` and return the authorization the client confirms.
    async fn create_authorization(&self, request: &AuthorizationRequest) -> Result<PaymentAuthorization>;

    /// Look up a previously created authorization.
    async fn retrieve_authorization(&self, id: &str) -> Result<PaymentAuthorization>;
}

/// Convert a decimal amount in major units into minor units (2 dp, half away from zero).
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    if amount.is_sign_negative() {
        return Err(PaymentError::InvalidData(format!("Negative amount {amount}")));
    }
    let cents = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero) * Decimal::ONE_HUNDRED;
    cents
        .to_i64()
        .ok_or_else(|| PaymentError::InvalidData(format!("Amount {amount} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(2500, 2)).unwrap(), 2500);
        assert_eq!(to_minor_units(Decimal::new(12345, 3)).unwrap(), 1235);
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
        assert!(matches!(to_minor_units(Decimal::new(-1, 0)), Err(PaymentError::InvalidData(_))));
    }

    #[test]
    fn test_idempotency_key_changes_with_amount() {
        let request = AuthorizationRequest {
            amount: 2500,
            currency: "usd".into(),
            booking_id: Uuid::new_v4(),
            driveway_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        };
        let changed = AuthorizationRequest {
            amount: 3000,
            ..request.clone()
        };
        assert_ne!(request.idempotency_key(), changed.idempotency_key());
        assert_eq!(request.metadata()["booking_id"], request.booking_id.to_string());
    }
}
