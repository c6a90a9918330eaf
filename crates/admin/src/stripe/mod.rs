//! Stripe API client for refunds.
//!
//! The back office never creates payments; it only refunds the payment
//! intent of a cancelled or refunded order. Each refund is keyed by the
//! order so a retried request cannot refund twice.
//!
//! # API Reference
//!
//! - Base URL: `https://api.stripe.com` (overridable for tests)
//! - Authentication: `Authorization: Bearer <secret key>`

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use kedai_core::OrderId;

use crate::config::StripeConfig;

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by Stripe.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Unauthorized (invalid secret key).
    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A created refund.
#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: String,
    /// `pending`, `succeeded`, `failed`, `canceled` or `requires_action`.
    pub status: String,
    #[serde(default)]
    pub amount: i64,
}

impl Refund {
    /// Stripe accepted the refund (it may still settle asynchronously).
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self.status.as_str(), "pending" | "succeeded")
    }
}

/// Idempotency key for refunding an order.
#[must_use]
pub fn refund_idempotency_key(order_id: OrderId) -> String {
    format!("refund-{order_id}")
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
}

impl StripeClient {
    /// Create a new Stripe API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| StripeError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("Authorization", auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_owned(),
            }),
        })
    }

    /// Refund a payment intent in full.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe rejects the refund.
    #[instrument(skip(self))]
    pub async fn refund_payment_intent(
        &self,
        order_id: OrderId,
        payment_intent_id: &str,
    ) -> Result<Refund, StripeError> {
        let url = format!("{}/v1/refunds", self.inner.api_base);
        let order = order_id.to_string();
        let form = [
            ("payment_intent", payment_intent_id),
            ("metadata[order_id]", order.as_str()),
        ];

        let response = self
            .inner
            .client
            .post(&url)
            .header("Idempotency-Key", refund_idempotency_key(order_id))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error(response).await);
        }

        let refund: Refund = response
            .json()
            .await
            .map_err(|e| StripeError::Parse(format!("Failed to parse response: {e}")))?;

        if !refund.is_accepted() {
            return Err(StripeError::Api {
                status: status.as_u16(),
                message: format!("refund {} is {}", refund.id, refund.status),
            });
        }

        tracing::info!(refund_id = %refund.id, status = %refund.status, "Refund created");
        Ok(refund)
    }
}

/// Parse error response from the Stripe API.
async fn parse_error(response: reqwest::Response) -> StripeError {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return StripeError::RateLimited(retry_after);
    }

    if status == 401 || status == 403 {
        return StripeError::Unauthorized;
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    StripeError::Api {
        status,
        message: error_message(&body),
    }
}

/// Stripe wraps errors as `{"error": {"message": ...}}`.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
        .unwrap_or_else(|| body.to_owned())
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.inner.api_base)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_is_per_order() {
        let id = OrderId::from_uuid(uuid::Uuid::nil());
        assert_eq!(
            refund_idempotency_key(id),
            "refund-00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_refund_acceptance() {
        let refund: Refund =
            serde_json::from_str(r#"{"id":"re_1","status":"pending","amount":2500}"#).unwrap();
        assert!(refund.is_accepted());
        let failed: Refund = serde_json::from_str(r#"{"id":"re_2","status":"failed"}"#).unwrap();
        assert!(!failed.is_accepted());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"message":"Charge already refunded","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(body), "Charge already refunded");
        assert_eq!(error_message("upstream down"), "upstream down");
    }
}
