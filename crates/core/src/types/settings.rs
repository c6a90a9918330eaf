//! Store-wide settings.
//!
//! Persisted as a single JSON document under the `general` key of the
//! `store_settings` table. Missing fields fall back to [`StoreSettings::default`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::address::{AddressError, ShippingAddress};
use super::price::CurrencyCode;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("store name is required")]
    EmptyStoreName,
    #[error("{0} cannot be negative")]
    Negative(&'static str),
    #[error("tax rate must be between 0 and 100")]
    TaxRateOutOfRange,
    #[error("ship-from address: {0}")]
    ShipFrom(#[from] AddressError),
}

/// Origin address used for courier rate checks and pickups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipFrom {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postcode: String,
    pub state: String,
    pub country: String,
}

impl Default for ShipFrom {
    fn default() -> Self {
        Self {
            name: "Kedai".to_owned(),
            phone: "0123456789".to_owned(),
            address: "1 Jalan Utama".to_owned(),
            city: "Kuala Lumpur".to_owned(),
            postcode: "50000".to_owned(),
            state: "kul".to_owned(),
            country: "MY".to_owned(),
        }
    }
}

impl ShipFrom {
    /// Validate by reusing the delivery address rules.
    fn validate(self) -> Result<Self, AddressError> {
        let checked = ShippingAddress {
            recipient_name: self.name,
            phone: self.phone,
            line1: self.address,
            line2: None,
            city: self.city,
            state: self.state,
            postcode: self.postcode,
            country: self.country,
        }
        .validate()?;
        Ok(Self {
            name: checked.recipient_name,
            phone: checked.phone,
            address: checked.line1,
            city: checked.city,
            postcode: checked.postcode,
            state: checked.state,
            country: checked.country,
        })
    }
}

/// Settings an admin can change at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub store_name: String,
    pub currency: CurrencyCode,
    /// Flat shipping fee charged per order.
    pub shipping_fee: Decimal,
    /// Orders with a subtotal at or above this ship free.
    pub free_shipping_threshold: Option<Decimal>,
    /// Percent, e.g. `6` for 6% SST.
    pub tax_rate: Decimal,
    pub low_stock_threshold: i32,
    pub reviews_require_approval: bool,
    pub ship_from: ShipFrom,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "Kedai".to_owned(),
            currency: CurrencyCode::MYR,
            shipping_fee: Decimal::new(800, 2),
            free_shipping_threshold: Some(Decimal::new(15000, 2)),
            tax_rate: Decimal::ZERO,
            low_stock_threshold: 5,
            reviews_require_approval: true,
            ship_from: ShipFrom::default(),
        }
    }
}

impl StoreSettings {
    /// Key under which settings are stored.
    pub const KEY: &'static str = "general";

    /// # Errors
    ///
    /// Returns the first [`SettingsError`] found.
    pub fn validate(mut self) -> Result<Self, SettingsError> {
        self.store_name = self.store_name.trim().to_owned();
        if self.store_name.is_empty() {
            return Err(SettingsError::EmptyStoreName);
        }
        if self.shipping_fee.is_sign_negative() && !self.shipping_fee.is_zero() {
            return Err(SettingsError::Negative("shipping_fee"));
        }
        if self
            .free_shipping_threshold
            .is_some_and(|t| t.is_sign_negative() && !t.is_zero())
        {
            return Err(SettingsError::Negative("free_shipping_threshold"));
        }
        if self.tax_rate < Decimal::ZERO || self.tax_rate > Decimal::ONE_HUNDRED {
            return Err(SettingsError::TaxRateOutOfRange);
        }
        if self.low_stock_threshold < 0 {
            return Err(SettingsError::Negative("low_stock_threshold"));
        }
        self.ship_from = self.ship_from.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(StoreSettings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: StoreSettings = serde_json::from_str(r#"{"store_name":"Kedai Kopi"}"#).unwrap();
        assert_eq!(s.store_name, "Kedai Kopi");
        assert_eq!(s.currency, CurrencyCode::MYR);
        assert_eq!(s.low_stock_threshold, 5);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut s = StoreSettings::default();
        s.tax_rate = Decimal::new(101, 0);
        assert_eq!(s.validate(), Err(SettingsError::TaxRateOutOfRange));

        let mut s = StoreSettings::default();
        s.shipping_fee = Decimal::new(-1, 0);
        assert_eq!(s.validate(), Err(SettingsError::Negative("shipping_fee")));

        let mut s = StoreSettings::default();
        s.store_name = "  ".into();
        assert_eq!(s.validate(), Err(SettingsError::EmptyStoreName));

        let mut s = StoreSettings::default();
        s.ship_from.postcode = "abc".into();
        assert!(matches!(s.validate(), Err(SettingsError::ShipFrom(_))));
    }
}
