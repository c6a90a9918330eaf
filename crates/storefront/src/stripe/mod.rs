//! Stripe API client.
//!
//! The storefront only needs two things from Stripe: creating Checkout
//! Sessions and verifying webhook signatures. Requests are form-encoded as
//! Stripe expects; every mutating call carries an `Idempotency-Key`.
//!
//! # API Reference
//!
//! - Base URL: `https://api.stripe.com` (overridable for tests)
//! - Authentication: `Authorization: Bearer <secret key>`

mod checkout;
mod types;
pub mod webhook;

pub use checkout::{CheckoutLine, CheckoutSessionParams};
pub use types::{CheckoutSession, Event, EventObject};

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;

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

    /// Amount could not be expressed in minor units.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
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

    /// Execute a form-encoded POST request with an idempotency key.
    pub(crate) async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: &str,
    ) -> Result<T, StripeError> {
        let url = format!("{}{path}", self.inner.api_base);
        let response = self
            .inner
            .client
            .post(&url)
            .header("Idempotency-Key", idempotency_key)
            .form(params)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| StripeError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(self.parse_error(response).await)
    }

    /// Parse error response from the Stripe API.
    async fn parse_error(&self, response: reqwest::Response) -> StripeError {
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

        // Stripe wraps errors as {"error": {"message": ...}}
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
            .unwrap_or(body);

        StripeError::Api { status, message }
    }
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.inner.api_base)
            .finish_non_exhaustive()
    }
}
