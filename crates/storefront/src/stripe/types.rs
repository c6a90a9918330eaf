//! Stripe API response and event types.
//!
//! Only the fields the storefront reads are modelled; everything else in
//! Stripe's payloads is ignored by serde.

use std::collections::HashMap;

use serde::Deserialize;

/// A created Checkout Session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Hosted payment page. Absent once the session is complete or expired.
    pub url: Option<String>,
}

/// A webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: EventObject,
}

/// The `data.object` of checkout session events.
///
/// Fields are optional so that events for other object types still parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventObject {
    pub id: Option<String>,
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub payment_status: Option<String>,
    pub payment_intent: Option<String>,
}

impl Event {
    #[must_use]
    pub const fn object(&self) -> &EventObject {
        &self.data.object
    }
}

impl EventObject {
    /// Order ID from metadata, falling back to `client_reference_id`.
    #[must_use]
    pub fn order_reference(&self) -> Option<&str> {
        self.metadata
            .get("order_id")
            .map(String::as_str)
            .or(self.client_reference_id.as_deref())
    }

    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkout_completed() {
        let json = r#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "livemode": false,
            "data": {"object": {
                "id": "cs_test_1",
                "object": "checkout.session",
                "client_reference_id": "ref",
                "metadata": {"order_id": "6f1c", "order_number": "KD-20250101-ABCDEF"},
                "payment_status": "paid",
                "payment_intent": "pi_1"
            }}
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.object().order_reference(), Some("6f1c"));
        assert!(event.object().is_paid());
        assert_eq!(event.object().payment_intent.as_deref(), Some("pi_1"));
    }

    #[test]
    fn test_order_reference_falls_back_to_client_reference() {
        let object = EventObject {
            client_reference_id: Some("abc".to_owned()),
            ..EventObject::default()
        };
        assert_eq!(object.order_reference(), Some("abc"));
        assert!(!object.is_paid());
    }

    #[test]
    fn test_parse_unrelated_event() {
        let json = r#"{"id":"evt_2","type":"charge.refunded","data":{"object":{"id":"ch_1","amount":100}}}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert!(event.object().order_reference().is_none());
    }
}
