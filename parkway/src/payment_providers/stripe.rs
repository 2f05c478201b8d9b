//! Stripe payment provider implementation
//!
//! Talks to the PaymentIntents REST API directly. Requests are form-encoded as Stripe
//! expects; errors are classified from the `error.type` field of the response body.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, header::CONTENT_TYPE};
use serde::Deserialize;

use crate::{
    config::StripeConfig,
    payment_providers::{AuthorizationRequest, PaymentAuthorization, PaymentError, PaymentProvider, Result},
};

/// Stripe payment provider
pub struct StripeProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TryFrom<StripeConfig> for StripeProvider {
    type Error = PaymentError;

    fn try_from(config: StripeConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key: config.api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    client_secret: Option<String>,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: Option<String>,
    decline_code: Option<String>,
}

impl StripeProvider {
    fn intents_url(&self) -> String {
        format!("{}/v1/payment_intents", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.api_key)
    }

    async fn parse_intent(response: Response) -> Result<PaymentAuthorization> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_error(status, response).await);
        }

        let intent: StripePaymentIntent = response.json().await?;
        let client_secret = intent.client_secret.ok_or_else(|| {
            tracing::error!("Stripe payment intent {} returned without a client secret", intent.id);
            PaymentError::InvalidData("Missing client_secret".to_string())
        })?;

        Ok(PaymentAuthorization {
            id: intent.id,
            client_secret,
            amount: intent.amount,
            currency: intent.currency,
        })
    }

    async fn classify_error(status: reqwest::StatusCode, response: Response) -> PaymentError {
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return PaymentError::Transport(e),
        };

        let Ok(envelope) = serde_json::from_str::<StripeErrorEnvelope>(&body) else {
            tracing::error!("Unparseable Stripe error response ({}): {}", status, body);
            return PaymentError::ProviderApi(format!("Stripe returned {status}"));
        };

        let error = envelope.error;
        match error.kind.as_str() {
            "card_error" => PaymentError::CardDeclined {
                message: error.message,
                decline_code: error.decline_code,
            },
            "invalid_request_error" => PaymentError::InvalidRequest {
                message: error.message.unwrap_or_else(|| "Invalid request".to_string()),
            },
            other => {
                tracing::error!("Stripe API error ({}, {}): {:?}", status, other, error.message);
                PaymentError::ProviderApi(error.message.unwrap_or_else(|| format!("Stripe returned {status}")))
            }
        }
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    #[tracing::instrument(skip_all, fields(booking_id = %request.booking_id, amount = request.amount), err)]
    async fn create_authorization(&self, request: &AuthorizationRequest) -> Result<PaymentAuthorization> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        form.extend(request.metadata().into_iter().map(|(k, v)| (format!("metadata[{k}]"), v)));

        let body = serde_urlencoded::to_string(&form).map_err(|e| PaymentError::InvalidData(e.to_string()))?;

        let response = self
            .authorized(self.client.post(self.intents_url()))
            .header("Idempotency-Key", request.idempotency_key())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let authorization = Self::parse_intent(response).await?;
        tracing::info!("Created Stripe payment intent {}", authorization.id);
        Ok(authorization)
    }

    #[tracing::instrument(skip(self), err)]
    async fn retrieve_authorization(&self, id: &str) -> Result<PaymentAuthorization> {
        let url = format!("{}/{}", self.intents_url(), sanitize_path_segment(id));
        let response = self.authorized(self.client.get(url)).send().await?;
        Self::parse_intent(response).await
    }
}

/// Intent ids are `pi_...` but come from our own storage; keep them from altering the path.
fn sanitize_path_segment(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use uuid::Uuid;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, header, header_exists, method, path},
    };

    fn provider(server: &MockServer, timeout: Duration) -> StripeProvider {
        StripeProvider::try_from(StripeConfig {
            api_key: "sk_test_123".to_string(),
            base_url: server.uri(),
            timeout,
        })
        .unwrap()
    }

    fn request(amount: i64) -> AuthorizationRequest {
        AuthorizationRequest {
            amount,
            currency: "USD".to_string(),
            booking_id: Uuid::new_v4(),
            driveway_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        }
    }

    fn intent_json(id: &str, amount: i64) -> serde_json::Value {
        json!({
            "id": id,
            "object": "payment_intent",
            "amount": amount,
            "currency": "usd",
            "client_secret": format!("{id}_secret_abc"),
            "status": "requires_payment_method"
        })
    }

    #[tokio::test]
    async fn test_create_authorization() {
        let server = MockServer::start().await;
        let request = request(2500);

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(header("idempotency-key", request.idempotency_key().as_str()))
            .and(body_string_contains("amount=2500"))
            .and(body_string_contains("currency=usd"))
            .and(body_string_contains(request.booking_id.to_string().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(intent_json("pi_123", 2500)))
            .expect(1)
            .mount(&server)
            .await;

        let authorization = provider(&server, Duration::from_secs(5)).create_authorization(&request).await.unwrap();

        assert_eq!(authorization.id, "pi_123");
        assert_eq!(authorization.client_secret, "pi_123_secret_abc");
        assert_eq!(authorization.amount, 2500);
        assert_eq!(authorization.currency, "usd");
    }

    #[tokio::test]
    async fn test_retrieve_authorization() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_456"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(intent_json("pi_456", 1000)))
            .expect(1)
            .mount(&server)
            .await;

        let authorization = provider(&server, Duration::from_secs(5)).retrieve_authorization("pi_456").await.unwrap();
        assert_eq!(authorization.amount, 1000);
    }

    #[tokio::test]
    async fn test_card_error_is_classified() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": {
                    "type": "card_error",
                    "code": "card_declined",
                    "decline_code": "insufficient_funds",
                    "message": "Your card has insufficient funds."
                }
            })))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5)).create_authorization(&request(2500)).await.unwrap_err();
        match err {
            PaymentError::CardDeclined { message, decline_code } => {
                assert_eq!(message.as_deref(), Some("Your card has insufficient funds."));
                assert_eq!(decline_code.as_deref(), Some("insufficient_funds"));
            }
            other => panic!("expected card error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_request_is_classified() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "type": "invalid_request_error",
                    "message": "Amount must be at least 50 cents"
                }
            })))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5)).create_authorization(&request(10)).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest { message } if message.contains("50 cents")));
    }

    #[tokio::test]
    async fn test_other_errors_are_provider_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": { "type": "api_error", "message": "Something went wrong" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let stripe = provider(&server, Duration::from_secs(5));
        assert!(matches!(
            stripe.create_authorization(&request(2500)).await,
            Err(PaymentError::ProviderApi(_))
        ));
        assert!(matches!(stripe.retrieve_authorization("pi_1").await, Err(PaymentError::ProviderApi(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(intent_json("pi_slow", 2500))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_millis(100))
            .create_authorization(&request(2500))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Transport(_)));
    }

    #[test]
    fn test_intent_id_cannot_escape_path() {
        assert_eq!(sanitize_path_segment("pi_123"), "pi_123");
        assert_eq!(sanitize_path_segment("../customers?x=1"), "customersx1");
    }
}
