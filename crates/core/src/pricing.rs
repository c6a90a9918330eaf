//! Cart and order totals.
//!
//! The same quote is shown in the cart, charged at checkout and snapshotted on
//! the order, so every caller goes through [`quote`].

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::types::{CurrencyCode, MoneyError, Price, StoreSettings};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error("line priced in {line} but the store sells in {store}")]
    CurrencyMismatch {
        line: CurrencyCode,
        store: CurrencyCode,
    },
}

/// A priced line to be totalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Price,
    pub quantity: u32,
}

/// Result of pricing a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Price,
    pub shipping: Price,
    pub tax: Price,
    pub total: Price,
    pub item_count: u32,
}

/// Price `lines` under the current store `settings`.
///
/// Shipping is free for an empty cart or when the subtotal reaches the free
/// shipping threshold. Tax is charged on the subtotal only.
///
/// # Errors
///
/// Returns [`PricingError`] if a line is in another currency or the sums
/// overflow.
pub fn quote(lines: &[PricedLine], settings: &StoreSettings) -> Result<OrderTotals, PricingError> {
    let currency = settings.currency;
    let mut subtotal = Price::zero(currency);
    let mut item_count: u32 = 0;

    for line in lines {
        if line.unit_price.currency_code != currency {
            return Err(PricingError::CurrencyMismatch {
                line: line.unit_price.currency_code,
                store: currency,
            });
        }
        subtotal = subtotal.checked_add(line.unit_price.times(line.quantity)?)?;
        item_count = item_count
            .checked_add(line.quantity)
            .ok_or(MoneyError::Overflow)?;
    }
    let subtotal = subtotal.round();

    let free = item_count == 0
        || settings
            .free_shipping_threshold
            .is_some_and(|threshold| subtotal.amount >= threshold);
    let shipping = if free {
        Price::zero(currency)
    } else {
        Price::new(settings.shipping_fee, currency).round()
    };

    let tax_amount = subtotal
        .amount
        .checked_mul(settings.tax_rate)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(MoneyError::Overflow)?;
    let tax = Price::new(tax_amount, currency).round();

    let total = subtotal.checked_add(shipping)?.checked_add(tax)?;

    Ok(OrderTotals {
        subtotal,
        shipping,
        tax,
        total,
        item_count,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rm(s: &str) -> Price {
        Price::new(s.parse().unwrap(), CurrencyCode::MYR)
    }

    fn line(price: &str, quantity: u32) -> PricedLine {
        PricedLine {
            unit_price: rm(price),
            quantity,
        }
    }

    fn settings() -> StoreSettings {
        StoreSettings {
            shipping_fee: "8.00".parse().unwrap(),
            free_shipping_threshold: Some("150.00".parse().unwrap()),
            tax_rate: "6".parse().unwrap(),
            ..StoreSettings::default()
        }
    }

    #[test]
    fn test_quote_charges_shipping_below_threshold() {
        let totals = quote(&[line("19.90", 2), line("5.25", 1)], &settings()).unwrap();
        assert_eq!(totals.subtotal, rm("45.05"));
        assert_eq!(totals.shipping, rm("8.00"));
        // 45.05 * 6% = 2.703
        assert_eq!(totals.tax, rm("2.70"));
        assert_eq!(totals.total, rm("55.75"));
        assert_eq!(totals.item_count, 3);
    }

    #[test]
    fn test_quote_free_shipping_at_threshold() {
        let totals = quote(&[line("75.00", 2)], &settings()).unwrap();
        assert_eq!(totals.shipping, rm("0"));
        assert_eq!(totals.total, rm("159.00"));
    }

    #[test]
    fn test_empty_cart_is_zero() {
        let totals = quote(&[], &settings()).unwrap();
        assert_eq!(totals.total, rm("0"));
        assert_eq!(totals.item_count, 0);
    }

    #[test]
    fn test_no_threshold_always_charges() {
        let s = StoreSettings {
            free_shipping_threshold: None,
            ..settings()
        };
        let totals = quote(&[line("1000", 1)], &s).unwrap();
        assert_eq!(totals.shipping, rm("8.00"));
    }

    #[test]
    fn test_rejects_foreign_currency() {
        let sgd = PricedLine {
            unit_price: Price::new(Decimal::ONE, CurrencyCode::SGD),
            quantity: 1,
        };
        assert!(matches!(
            quote(&[sgd], &settings()),
            Err(PricingError::CurrencyMismatch { .. })
        ));
    }
}
