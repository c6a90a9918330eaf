//! EasyParcel courier API client.
//!
//! Books domestic shipments through EasyParcel's bulk form API:
//!
//! - `EPRateCheckingBulk` - quote services between two postcodes
//! - `EPSubmitOrderBulk` - create a booking, returns an EasyParcel order number
//! - `EPPayOrderBulk` - pay the booking from account credit, returns the AWB
//!
//! Every call carries a single `bulk[0]` entry. The API answers HTTP 200 even
//! for failures; the envelope's `api_status` and each result's `status` say
//! whether the call worked.

pub mod client;
pub mod types;

pub use client::EasyParcelClient;
pub use types::{Party, PaidParcel, Rate, RateRequest, SubmitOrderRequest, SubmittedOrder};

use thiserror::Error;

/// Errors that can occur when interacting with the EasyParcel API.
#[derive(Debug, Error)]
pub enum EasyParcelError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The API call itself was rejected (bad key, missing fields).
    #[error("EasyParcel rejected the request: {0}")]
    Rejected(String),

    /// The call went through but the bulk entry failed.
    #[error("EasyParcel could not complete the request: {0}")]
    Failed(String),

    /// No courier serves the route.
    #[error("No shipping services available for this route")]
    NoRates,

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Map a Malaysian state name (or an existing code) to EasyParcel's state code.
#[must_use]
pub fn state_code(state: &str) -> Option<&'static str> {
    const STATES: &[(&str, &[&str])] = &[
        ("jhr", &["johor", "johor bahru"]),
        ("kdh", &["kedah"]),
        ("ktn", &["kelantan"]),
        ("mlk", &["melaka", "malacca"]),
        ("nsn", &["negeri sembilan"]),
        ("phg", &["pahang"]),
        ("prk", &["perak"]),
        ("pls", &["perlis"]),
        ("png", &["pulau pinang", "penang"]),
        ("sgr", &["selangor"]),
        ("trg", &["terengganu"]),
        ("kul", &["kuala lumpur", "wilayah persekutuan kuala lumpur", "wp kuala lumpur"]),
        ("pjy", &["putrajaya", "wp putrajaya"]),
        ("srw", &["sarawak"]),
        ("sbh", &["sabah"]),
        ("lbn", &["labuan", "wp labuan"]),
    ];

    let normalised = state.trim().to_lowercase();
    STATES
        .iter()
        .find(|(code, names)| *code == normalised || names.contains(&normalised.as_str()))
        .map(|(code, _)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_code_from_name() {
        assert_eq!(state_code("Selangor"), Some("sgr"));
        assert_eq!(state_code(" Penang "), Some("png"));
        assert_eq!(state_code("Kuala Lumpur"), Some("kul"));
    }

    #[test]
    fn test_state_code_passthrough() {
        assert_eq!(state_code("kul"), Some("kul"));
        assert_eq!(state_code("JHR"), Some("jhr"));
    }

    #[test]
    fn test_state_code_unknown() {
        assert_eq!(state_code("Bavaria"), None);
    }
}
