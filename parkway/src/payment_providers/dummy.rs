//! Dummy payment provider implementation
//!
//! Authorizes every request in-process without contacting a processor. Useful for local
//! development and tests; nothing is ever charged.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::{
    config::DummyConfig,
    payment_providers::{AuthorizationRequest, PaymentAuthorization, PaymentError, PaymentProvider, Result},
};

/// Dummy payment provider that records authorizations in memory
#[derive(Default)]
pub struct DummyProvider {
    decline_all: bool,
    authorizations: DashMap<String, PaymentAuthorization>,
    created: AtomicUsize,
}

impl From<DummyConfig> for DummyProvider {
    fn from(config: DummyConfig) -> Self {
        Self {
            decline_all: config.decline_all,
            ..Default::default()
        }
    }
}

impl DummyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of authorizations created so far
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProvider for DummyProvider {
    async fn create_authorization(&self, request: &AuthorizationRequest) -> Result<PaymentAuthorization> {
        if self.decline_all {
            return Err(PaymentError::CardDeclined {
                message: Some("Dummy provider declines all cards".to_string()),
                decline_code: Some("generic_decline".to_string()),
            });
        }

        let id = format!("pi_dummy_{}", Uuid::new_v4().simple());
        let authorization = PaymentAuthorization {
            client_secret: format!("{id}_secret_{}", Uuid::new_v4().simple()),
            id: id.clone(),
            amount: request.amount,
            currency: request.currency.to_lowercase(),
        };

        self.authorizations.insert(id.clone(), authorization.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Dummy provider authorized {} {} as {}", request.amount, request.currency, id);

        Ok(authorization)
    }

    async fn retrieve_authorization(&self, id: &str) -> Result<PaymentAuthorization> {
        self.authorizations
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PaymentError::InvalidRequest {
                message: format!("No such payment_intent: '{id}'"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AuthorizationRequest {
        AuthorizationRequest {
            amount: 1500,
            currency: "USD".to_string(),
            booking_id: Uuid::new_v4(),
            driveway_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_create_then_retrieve() {
        let provider = DummyProvider::new();
        let created = provider.create_authorization(&request()).await.unwrap();

        assert!(created.id.starts_with("pi_dummy_"));
        assert_eq!(created.currency, "usd");
        assert_eq!(provider.retrieve_authorization(&created.id).await.unwrap(), created);
        assert_eq!(provider.created_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let provider = DummyProvider::new();
        assert!(matches!(
            provider.retrieve_authorization("pi_missing").await,
            Err(PaymentError::InvalidRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_decline_all() {
        let provider = DummyProvider::from(DummyConfig { decline_all: true });
        assert!(matches!(
            provider.create_authorization(&request()).await,
            Err(PaymentError::CardDeclined { .. })
        ));
        assert_eq!(provider.created_count(), 0);
    }
}
