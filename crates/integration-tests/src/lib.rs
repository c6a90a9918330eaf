//! Integration tests for Kedai.
//!
//! # Running Tests
//!
//! ```bash
//! # Always-on tests (no servers needed)
//! cargo test -p kedai-integration-tests
//!
//! # Server tests: migrate, create a staff account, start both binaries
//! cargo run -p kedai-cli -- migrate
//! cargo run -p kedai-cli -- user create -e staff@kedai.test -n Staff -r staff -p staff-password
//! cargo test -p kedai-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_URL` - default `http://localhost:3000`
//! - `ADMIN_URL` - default `http://localhost:3001`
//! - `TEST_STAFF_EMAIL` / `TEST_STAFF_PASSWORD` - a staff account for admin tests
//! - `STRIPE_WEBHOOK_SECRET` - the storefront's webhook secret, for signed events

#![allow(clippy::missing_panics_doc)]

use hmac::{Hmac, Mac};
use reqwest::{Client, Response, StatusCode};
use sha2::Sha256;
use serde_json::{Value, json};
use uuid::Uuid;

/// Base URL of the storefront API.
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Base URL of the admin API.
#[must_use]
pub fn admin_url() -> String {
    std::env::var("ADMIN_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// A client that keeps session cookies between requests.
#[must_use]
pub fn session_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A unique throwaway email address.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@kedai.test", Uuid::new_v4().simple())
}

/// Password used for every account a test registers.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Register a new customer on the storefront; the client is logged in after.
pub async fn register_customer(client: &Client) -> (String, Value) {
    let email = unique_email("customer");
    let resp = client
        .post(format!("{}/api/auth/register", storefront_url()))
        .json(&json!({
            "email": email,
            "password": TEST_PASSWORD,
            "full_name": "Test Customer",
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let profile = resp.json().await.expect("Invalid register response");
    (email, profile)
}

/// Log in to the admin API.
pub async fn admin_login(client: &Client, email: &str, password: &str) -> Response {
    client
        .post(format!("{}/api/auth/login", admin_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to call admin login")
}

/// A shipping address the storefront accepts.
#[must_use]
pub fn test_address() -> Value {
    json!({
        "recipient_name": "Test Customer",
        "phone": "0123456789",
        "line1": "1 Jalan Ujian",
        "city": "Petaling Jaya",
        "state": "Selangor",
        "postcode": "47300",
    })
}

/// Log in to the admin API with `TEST_STAFF_EMAIL` / `TEST_STAFF_PASSWORD`.
pub async fn staff_client() -> Client {
    let email = std::env::var("TEST_STAFF_EMAIL").expect("TEST_STAFF_EMAIL not set");
    let password = std::env::var("TEST_STAFF_PASSWORD").expect("TEST_STAFF_PASSWORD not set");

    let client = session_client();
    let resp = admin_login(&client, &email, &password).await;
    assert_eq!(resp.status(), StatusCode::OK, "staff login failed");
    client
}

/// `Stripe-Signature` header for `payload` signed at `timestamp`.
#[must_use]
pub fn stripe_signature(secret: &str, timestamp: i64, payload: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

/// A paid `checkout.session.completed` event for `order_id`.
#[must_use]
pub fn checkout_completed_event(event_id: &str, order_id: &str) -> String {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": format!("cs_test_{}", Uuid::new_v4().simple()),
                "client_reference_id": order_id,
                "metadata": { "order_id": order_id },
                "payment_status": "paid",
                "payment_intent": format!("pi_test_{}", Uuid::new_v4().simple()),
            }
        }
    })
    .to_string()
}

/// Deliver a signed event to the storefront webhook.
pub async fn deliver_event(payload: &str) -> Response {
    let secret =
        std::env::var("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET not set");
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before 1970")
        .as_secs();
    let timestamp = i64::try_from(now).expect("timestamp fits i64");

    reqwest::Client::new()
        .post(format!("{}/api/webhooks/stripe", storefront_url()))
        .header("content-type", "application/json")
        .header("stripe-signature", stripe_signature(&secret, timestamp, payload))
        .body(payload.to_owned())
        .send()
        .await
        .expect("Failed to post webhook")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stripe_signature_format() {
        let header = stripe_signature("whsec_test", 1_700_000_000, "{}");
        let (t, v1) = header.split_once(',').unwrap();
        assert_eq!(t, "t=1700000000");
        let sig = v1.strip_prefix("v1=").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
