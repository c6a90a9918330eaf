//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header looks like `t=1492774577,v1=5257a8...,v0=...`.
//! The signed payload is `"{t}.{raw body}"` and each `v1` entry is a hex
//! HMAC-SHA256 of it under the endpoint secret. During secret rotation Stripe
//! sends several `v1` entries; any match is accepted.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing timestamp in signature header")]
    MissingTimestamp,
    #[error("no v1 signature in signature header")]
    MissingSignature,
    #[error("timestamp outside tolerance")]
    TimestampOutOfRange,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("invalid secret")]
    InvalidSecret,
}

/// Verify a webhook payload against its `Stripe-Signature` header.
///
/// `now` is Unix seconds; pass [`now_unix`] outside tests.
///
/// # Errors
///
/// Returns `WebhookError` if the header is malformed, the timestamp is more
/// than `tolerance_secs` away from `now`, or no signature matches.
pub fn verify_signature(
    secret: &SecretString,
    header: &str,
    payload: &[u8],
    tolerance_secs: i64,
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MissingTimestamp)?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::MissingTimestamp)?;

    if signatures.is_empty() {
        return Err(WebhookError::MissingSignature);
    }

    if now.abs_diff(ts) > tolerance_secs.unsigned_abs() {
        return Err(WebhookError::TimestampOutOfRange);
    }

    let expected = sign(secret, timestamp, payload)?;

    if signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
fn sign(secret: &SecretString, timestamp: &str, payload: &[u8]) -> Result<String, WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| WebhookError::InvalidSecret)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Current Unix time in seconds.
#[must_use]
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    fn secret() -> SecretString {
        SecretString::from("whsec_kx82nd0qpLm3vB7sT9wYz4")
    }

    fn header_for(ts: i64, body: &[u8]) -> String {
        let sig = sign(&secret(), &ts.to_string(), body).unwrap();
        format!("t={ts},v1={sig}")
    }

    #[test]
    fn test_valid_signature() {
        let header = header_for(NOW, BODY);
        assert_eq!(verify_signature(&secret(), &header, BODY, 300, NOW), Ok(()));
    }

    #[test]
    fn test_any_v1_entry_may_match() {
        let good = sign(&secret(), &NOW.to_string(), BODY).unwrap();
        let header = format!("t={NOW}, v1={}, v1={good}, v0=legacy", "0".repeat(64));
        assert_eq!(verify_signature(&secret(), &header, BODY, 300, NOW), Ok(()));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = header_for(NOW, BODY);
        assert_eq!(
            verify_signature(&secret(), &header, b"{}", 300, NOW),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = header_for(NOW, BODY);
        let other = SecretString::from("whsec_other9Qk2mZp7Lr4Xv1");
        assert_eq!(
            verify_signature(&other, &header, BODY, 300, NOW),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_stale_and_future_timestamps_rejected() {
        let stale = header_for(NOW - 301, BODY);
        assert_eq!(
            verify_signature(&secret(), &stale, BODY, 300, NOW),
            Err(WebhookError::TimestampOutOfRange)
        );
        let future = header_for(NOW + 301, BODY);
        assert_eq!(
            verify_signature(&secret(), &future, BODY, 300, NOW),
            Err(WebhookError::TimestampOutOfRange)
        );
        let edge = header_for(NOW - 300, BODY);
        assert_eq!(verify_signature(&secret(), &edge, BODY, 300, NOW), Ok(()));
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(
            verify_signature(&secret(), "v1=abc", BODY, 300, NOW),
            Err(WebhookError::MissingTimestamp)
        );
        assert_eq!(
            verify_signature(&secret(), "t=notanumber,v1=abc", BODY, 300, NOW),
            Err(WebhookError::MissingTimestamp)
        );
        assert_eq!(
            verify_signature(&secret(), &format!("t={NOW},v0=abc"), BODY, 300, NOW),
            Err(WebhookError::MissingSignature)
        );
        assert_eq!(
            verify_signature(&secret(), "", BODY, 300, NOW),
            Err(WebhookError::MissingTimestamp)
        );
    }

    #[test]
    fn test_extreme_timestamps_rejected_without_overflow() {
        for ts in [i64::MIN, i64::MAX] {
            let header = format!("t={ts},v1=abc");
            assert_eq!(
                verify_signature(&secret(), &header, BODY, 300, NOW),
                Err(WebhookError::TimestampOutOfRange)
            );
        }
        assert_eq!(
            verify_signature(&secret(), &format!("t={NOW},v1=abc"), BODY, 300, i64::MIN),
            Err(WebhookError::TimestampOutOfRange)
        );
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
