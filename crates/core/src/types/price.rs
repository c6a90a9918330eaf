//! Money represented with decimal arithmetic.
//!
//! Amounts are stored in the currency's standard unit (ringgit, not sen) as
//! `NUMERIC(12,2)` in Postgres. Stripe wants integer minor units, which is
//! what [`Price::to_minor_units`] produces.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by money arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("currency mismatch: {0} vs {1}")]
    CurrencyMismatch(CurrencyCode, CurrencyCode),
    #[error("amount overflow")]
    Overflow,
    #[error("amount cannot be negative")]
    Negative,
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Build a price from integer minor units (e.g. sen).
    #[must_use]
    pub fn from_minor_units(units: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(units, 2), currency_code)
    }

    /// Add two prices of the same currency.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::CurrencyMismatch` or `MoneyError::Overflow`.
    pub fn checked_add(self, other: Self) -> Result<Self, MoneyError> {
        if self.currency_code != other.currency_code {
            return Err(MoneyError::CurrencyMismatch(
                self.currency_code,
                other.currency_code,
            ));
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency_code))
    }

    /// Multiply by a line quantity.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the product does not fit.
    pub fn times(self, quantity: u32) -> Result<Self, MoneyError> {
        let amount = self
            .amount
            .checked_mul(Decimal::from(quantity))
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::new(amount, self.currency_code))
    }

    /// Round to two decimal places, halves away from zero.
    #[must_use]
    pub fn round(self) -> Self {
        Self::new(
            self.amount
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            self.currency_code,
        )
    }

    /// Convert to integer minor units for payment processors.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Negative` for negative amounts and
    /// `MoneyError::Overflow` if the value does not fit in `i64`.
    pub fn to_minor_units(self) -> Result<i64, MoneyError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        self.round()
            .amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|d| d.to_i64())
            .ok_or(MoneyError::Overflow)
    }

    /// Format for display (e.g., "RM 19.90").
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} {:.2}", self.currency_code.symbol(), self.round().amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Currencies the shop can price in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    MYR,
    SGD,
    USD,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::MYR => "RM",
            Self::SGD => "S$",
            Self::USD => "$",
        }
    }

    /// ISO 4217 code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MYR => "MYR",
            Self::SGD => "SGD",
            Self::USD => "USD",
        }
    }

    /// Lowercase code as Stripe expects it.
    #[must_use]
    pub const fn stripe_code(&self) -> &'static str {
        match self {
            Self::MYR => "myr",
            Self::SGD => "sgd",
            Self::USD => "usd",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MYR" => Ok(Self::MYR),
            "SGD" => Ok(Self::SGD),
            "USD" => Ok(Self::USD),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for CurrencyCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for CurrencyCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for CurrencyCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.code(), buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rm(s: &str) -> Price {
        Price::new(s.parse().unwrap(), CurrencyCode::MYR)
    }

    #[test]
    fn test_minor_units_round_half_away_from_zero() {
        assert_eq!(rm("19.90").to_minor_units().unwrap(), 1990);
        assert_eq!(rm("0.005").to_minor_units().unwrap(), 1);
        assert_eq!(rm("12.344").to_minor_units().unwrap(), 1234);
        assert_eq!(rm("0").to_minor_units().unwrap(), 0);
    }

    #[test]
    fn test_minor_units_rejects_negative() {
        assert_eq!(rm("-1.00").to_minor_units(), Err(MoneyError::Negative));
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(Price::from_minor_units(1250, CurrencyCode::MYR), rm("12.50"));
    }

    #[test]
    fn test_add_requires_same_currency() {
        let sgd = Price::new(Decimal::ONE, CurrencyCode::SGD);
        assert!(matches!(
            rm("1").checked_add(sgd),
            Err(MoneyError::CurrencyMismatch(CurrencyCode::MYR, CurrencyCode::SGD))
        ));
        assert_eq!(rm("1.10").checked_add(rm("2.20")).unwrap(), rm("3.30"));
    }

    #[test]
    fn test_times_quantity() {
        assert_eq!(rm("4.95").times(3).unwrap(), rm("14.85"));
        assert_eq!(rm("4.95").times(0).unwrap(), rm("0"));
    }

    #[test]
    fn test_display() {
        assert_eq!(rm("7.5").display(), "RM 7.50");
        assert_eq!(
            Price::new(Decimal::new(300, 2), CurrencyCode::SGD).to_string(),
            "S$ 3.00"
        );
    }

    #[test]
    fn test_currency_parse_case_insensitive() {
        assert_eq!("myr".parse::<CurrencyCode>().unwrap(), CurrencyCode::MYR);
        assert!("EUR".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::SGD.stripe_code(), "sgd");
    }
}
