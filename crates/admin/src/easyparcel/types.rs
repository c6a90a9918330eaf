//! Request and response shapes for the EasyParcel bulk API.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Requests
// =============================================================================

/// Quote request between the store origin and a delivery address.
#[derive(Debug, Clone)]
pub struct RateRequest {
    pub pick_postcode: String,
    pub pick_state: String,
    pub pick_country: String,
    pub send_postcode: String,
    pub send_state: String,
    pub send_country: String,
    pub weight_kg: Decimal,
}

impl RateRequest {
    pub(crate) fn to_form(&self) -> Vec<(String, String)> {
        vec![
            bulk("pick_code", &self.pick_postcode),
            bulk("pick_state", &self.pick_state),
            bulk("pick_country", &self.pick_country),
            bulk("send_code", &self.send_postcode),
            bulk("send_state", &self.send_state),
            bulk("send_country", &self.send_country),
            bulk("weight", &self.weight_kg.to_string()),
        ]
    }
}

/// One end of a parcel's journey.
#[derive(Debug, Clone)]
pub struct Party {
    pub name: String,
    pub phone: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub postcode: String,
    pub state: String,
    pub country: String,
}

/// Booking request for a quoted service.
#[derive(Debug, Clone)]
pub struct SubmitOrderRequest {
    pub service_id: String,
    pub weight_kg: Decimal,
    pub content: String,
    /// Declared parcel value.
    pub value: Decimal,
    pub pick: Party,
    pub send: Party,
    pub send_email: String,
    pub collect_date: NaiveDate,
    /// Our order number, echoed back on the label.
    pub reference: String,
}

impl SubmitOrderRequest {
    pub(crate) fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            bulk("service_id", &self.service_id),
            bulk("weight", &self.weight_kg.to_string()),
            bulk("content", &self.content),
            bulk("value", &self.value.round_dp(2).to_string()),
            bulk("collect_date", &self.collect_date.format("%Y-%m-%d").to_string()),
            bulk("reference", &self.reference),
            bulk("send_email", &self.send_email),
            bulk("sms", "0"),
        ];
        push_party(&mut form, "pick", &self.pick);
        push_party(&mut form, "send", &self.send);
        form
    }
}

fn push_party(form: &mut Vec<(String, String)>, side: &str, party: &Party) {
    form.extend([
        bulk(&format!("{side}_name"), &party.name),
        bulk(&format!("{side}_contact"), &party.phone),
        bulk(&format!("{side}_addr1"), &party.address1),
        bulk(
            &format!("{side}_addr2"),
            party.address2.as_deref().unwrap_or_default(),
        ),
        bulk(&format!("{side}_city"), &party.city),
        bulk(&format!("{side}_code"), &party.postcode),
        bulk(&format!("{side}_state"), &party.state),
        bulk(&format!("{side}_country"), &party.country),
    ]);
}

/// A `bulk[0][field]` form pair.
fn bulk(field: &str, value: &str) -> (String, String) {
    (format!("bulk[0][{field}]"), value.to_owned())
}

// =============================================================================
// Responses
// =============================================================================

/// Top-level envelope of every bulk call.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub api_status: String,
    #[serde(default)]
    pub error_code: serde_json::Value,
    #[serde(default)]
    pub error_remark: String,
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
}

impl<T> Envelope<T> {
    /// The call itself succeeded (individual entries may still fail).
    pub fn is_success(&self) -> bool {
        self.api_status.eq_ignore_ascii_case("success")
            && match &self.error_code {
                serde_json::Value::Null => true,
                serde_json::Value::String(code) => code.is_empty() || code == "0",
                serde_json::Value::Number(code) => code.as_i64() == Some(0),
                _ => false,
            }
    }
}

/// `status` of a single bulk entry.
fn entry_ok(status: &str) -> bool {
    status.eq_ignore_ascii_case("success")
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub rates: Vec<Rate>,
}

impl RateResult {
    pub fn is_ok(&self) -> bool {
        entry_ok(&self.status)
    }
}

/// A courier service quoted for a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rate {
    pub service_id: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub courier_name: String,
    pub price: Decimal,
    /// Delivery estimate, e.g. "1-2 working day(s)".
    #[serde(default)]
    pub delivery: Option<String>,
    #[serde(default)]
    pub pickup_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub courier: Option<String>,
}

impl SubmitResult {
    pub fn is_ok(&self) -> bool {
        entry_ok(&self.status)
    }
}

/// A booking EasyParcel accepted, not yet paid.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedOrder {
    pub order_number: String,
    pub price: Option<Decimal>,
    pub courier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PayResult {
    #[serde(default)]
    pub orderno: Option<String>,
    /// Human status, e.g. "Payment Done" or "Insufficient Credit".
    #[serde(default)]
    pub messagenow: String,
    #[serde(default)]
    pub parcel: Vec<ParcelResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParcelResult {
    #[serde(default)]
    pub parcelno: Option<String>,
    #[serde(default)]
    pub awb: Option<String>,
    #[serde(default)]
    pub awb_id_link: Option<String>,
    #[serde(default)]
    pub tracking_url: Option<String>,
}

/// Label details of a paid booking.
#[derive(Debug, Clone, Serialize)]
pub struct PaidParcel {
    pub order_number: String,
    pub parcel_no: Option<String>,
    pub awb_no: Option<String>,
    pub awb_link: Option<String>,
    pub tracking_url: Option<String>,
}

impl PayResult {
    /// The label was bought and an AWB assigned.
    pub fn into_paid(self, order_number: &str) -> Result<PaidParcel, String> {
        let parcel = self
            .parcel
            .into_iter()
            .find(|p| p.awb.as_deref().is_some_and(|awb| !awb.is_empty()));

        match parcel {
            Some(p) => Ok(PaidParcel {
                order_number: self.orderno.unwrap_or_else(|| order_number.to_owned()),
                parcel_no: p.parcelno,
                awb_no: p.awb,
                awb_link: p.awb_id_link,
                tracking_url: p.tracking_url,
            }),
            None if self.messagenow.is_empty() => Err("no AWB returned".to_owned()),
            None => Err(self.messagenow),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn party(name: &str, postcode: &str, state: &str) -> Party {
        Party {
            name: name.to_owned(),
            phone: "0123456789".to_owned(),
            address1: "1 Jalan Utama".to_owned(),
            address2: None,
            city: "Kuala Lumpur".to_owned(),
            postcode: postcode.to_owned(),
            state: state.to_owned(),
            country: "MY".to_owned(),
        }
    }

    #[test]
    fn test_rate_form_uses_bulk_fields() {
        let request = RateRequest {
            pick_postcode: "50000".into(),
            pick_state: "kul".into(),
            pick_country: "MY".into(),
            send_postcode: "46000".into(),
            send_state: "sgr".into(),
            send_country: "MY".into(),
            weight_kg: "1.25".parse().unwrap(),
        };
        let form = request.to_form();
        assert_eq!(value(&form, "bulk[0][pick_code]"), Some("50000"));
        assert_eq!(value(&form, "bulk[0][send_state]"), Some("sgr"));
        assert_eq!(value(&form, "bulk[0][weight]"), Some("1.25"));
    }

    #[test]
    fn test_submit_form_carries_both_parties() {
        let request = SubmitOrderRequest {
            service_id: "EP-CS0I".into(),
            weight_kg: "0.5".parse().unwrap(),
            content: "Kopi".into(),
            value: "37.5".parse().unwrap(),
            pick: party("Kedai", "50000", "kul"),
            send: party("Aminah", "46000", "sgr"),
            send_email: "aminah@example.my".into(),
            collect_date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            reference: "KD-20250304-ABC123".into(),
        };
        let form = request.to_form();
        assert_eq!(value(&form, "bulk[0][pick_name]"), Some("Kedai"));
        assert_eq!(value(&form, "bulk[0][send_name]"), Some("Aminah"));
        assert_eq!(value(&form, "bulk[0][send_addr2]"), Some(""));
        assert_eq!(value(&form, "bulk[0][collect_date]"), Some("2025-03-04"));
        assert_eq!(value(&form, "bulk[0][value]"), Some("37.50"));
    }

    #[test]
    fn test_envelope_success_flags() {
        let ok: Envelope<RateResult> =
            serde_json::from_str(r#"{"api_status":"Success","error_code":"0","result":[]}"#)
                .unwrap();
        assert!(ok.is_success());

        let bad: Envelope<RateResult> = serde_json::from_str(
            r#"{"api_status":"Error","error_code":"2","error_remark":"Invalid API key"}"#,
        )
        .unwrap();
        assert!(!bad.is_success());
        assert_eq!(bad.error_remark, "Invalid API key");
    }

    #[test]
    fn test_rates_parse_string_prices() {
        let body = r#"{"api_status":"Success","error_code":"0","result":[{"status":"Success",
            "remarks":"","rates":[{"service_id":"EP-CS0I","service_name":"Pos Laju",
            "courier_name":"Pos Malaysia","price":"6.36","delivery":"1-2 working day(s)"}]}]}"#;
        let envelope: Envelope<RateResult> = serde_json::from_str(body).unwrap();
        let rate = &envelope.result[0].rates[0];
        assert_eq!(rate.price, "6.36".parse::<Decimal>().unwrap());
        assert_eq!(rate.pickup_date, None);
    }

    #[test]
    fn test_pay_result_without_awb_is_failure() {
        let result: PayResult =
            serde_json::from_str(r#"{"orderno":"EI-123","messagenow":"Insufficient Credit","parcel":[]}"#)
                .unwrap();
        assert_eq!(result.into_paid("EI-123").unwrap_err(), "Insufficient Credit");
    }

    #[test]
    fn test_pay_result_with_awb() {
        let result: PayResult = serde_json::from_str(
            r#"{"orderno":"EI-123","messagenow":"Payment Done","parcel":[{"parcelno":"EP-1",
               "awb":"ER123MY","awb_id_link":"https://x/awb","tracking_url":"https://x/t"}]}"#,
        )
        .unwrap();
        let paid = result.into_paid("EI-123").unwrap();
        assert_eq!(paid.awb_no.as_deref(), Some("ER123MY"));
        assert_eq!(paid.parcel_no.as_deref(), Some("EP-1"));
    }
}
