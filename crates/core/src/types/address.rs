//! Shipping addresses.
//!
//! Addresses are stored on orders as JSONB snapshots, so the shape here is the
//! persisted shape.

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("postcode must be five digits")]
    InvalidPostcode,
    #[error("country must be a two-letter ISO code")]
    InvalidCountry,
    #[error("phone number is not valid")]
    InvalidPhone,
}

fn default_country() -> String {
    "MY".to_owned()
}

/// Where an order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postcode: String,
    #[serde(default = "default_country")]
    pub country: String,
}

const MAX_FIELD: usize = 200;

fn required(value: &mut String, field: &'static str) -> Result<(), AddressError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AddressError::Missing(field));
    }
    if trimmed.chars().count() > MAX_FIELD {
        return Err(AddressError::TooLong {
            field,
            max: MAX_FIELD,
        });
    }
    *value = trimmed.to_owned();
    Ok(())
}

impl ShippingAddress {
    /// Trim every field and check the address is deliverable.
    ///
    /// # Errors
    ///
    /// Returns the first [`AddressError`] found.
    pub fn validate(mut self) -> Result<Self, AddressError> {
        required(&mut self.recipient_name, "recipient_name")?;
        required(&mut self.phone, "phone")?;
        required(&mut self.line1, "line1")?;
        required(&mut self.city, "city")?;
        required(&mut self.state, "state")?;
        required(&mut self.postcode, "postcode")?;

        self.line2 = self
            .line2
            .map(|l| l.trim().to_owned())
            .filter(|l| !l.is_empty());

        let digits = self.phone.chars().filter(char::is_ascii_digit).count();
        let phone_chars_ok = self
            .phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
        if !phone_chars_ok || !(7..=15).contains(&digits) {
            return Err(AddressError::InvalidPhone);
        }

        let country = self.country.trim().to_ascii_uppercase();
        if country.len() != 2 || !country.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(AddressError::InvalidCountry);
        }
        self.country = country;

        if self.country == "MY"
            && (self.postcode.len() != 5 || !self.postcode.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(AddressError::InvalidPostcode);
        }

        Ok(self)
    }

    /// Single-line form used in emails and logs.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if let Some(line2) = &self.line2 {
            parts.push(line2);
        }
        parts.extend([
            self.postcode.as_str(),
            self.city.as_str(),
            self.state.as_str(),
            self.country.as_str(),
        ]);
        parts.join(", ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> ShippingAddress {
        ShippingAddress {
            recipient_name: " Aminah Binti Yusof ".into(),
            phone: "+60 12-345 6789".into(),
            line1: "12 Jalan Bunga Raya".into(),
            line2: Some("   ".into()),
            city: "Petaling Jaya".into(),
            state: "Selangor".into(),
            postcode: "46000".into(),
            country: "my".into(),
        }
    }

    #[test]
    fn test_validate_normalises() {
        let addr = sample().validate().unwrap();
        assert_eq!(addr.recipient_name, "Aminah Binti Yusof");
        assert_eq!(addr.line2, None);
        assert_eq!(addr.country, "MY");
        assert_eq!(
            addr.one_line(),
            "12 Jalan Bunga Raya, 46000, Petaling Jaya, Selangor, MY"
        );
    }

    #[test]
    fn test_rejects_missing_fields() {
        let mut addr = sample();
        addr.city = " ".into();
        assert_eq!(addr.validate(), Err(AddressError::Missing("city")));
    }

    #[test]
    fn test_malaysian_postcode() {
        let mut addr = sample();
        addr.postcode = "4600".into();
        assert_eq!(addr.validate(), Err(AddressError::InvalidPostcode));

        let mut sg = sample();
        sg.country = "SG".into();
        sg.postcode = "238801".into();
        assert!(sg.validate().is_ok());
    }

    #[test]
    fn test_phone() {
        let mut addr = sample();
        addr.phone = "call me".into();
        assert_eq!(addr.validate(), Err(AddressError::InvalidPhone));
    }

    #[test]
    fn test_country_defaults_to_my() {
        let json = r#"{"recipient_name":"A","phone":"0123456789","line1":"1 Jalan","city":"KL","state":"WP","postcode":"50000"}"#;
        let addr: ShippingAddress = serde_json::from_str(json).unwrap();
        assert_eq!(addr.country, "MY");
    }
}
