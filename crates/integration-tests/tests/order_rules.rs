//! Pricing and order lifecycle rules shared by both servers.
//!
//! These run without any servers.

use kedai_admin::models::ShippingLine;
use kedai_admin::services::lifecycle::{LifecycleError, check_transition, notification_text};
use kedai_admin::services::shipping::parcel_weight_kg;
use kedai_core::pricing::{PricedLine, quote};
use kedai_core::{CurrencyCode, OrderStatus, Price, StoreSettings};
use rust_decimal::Decimal;

fn myr(amount: &str) -> Price {
    Price::new(amount.parse().expect("valid decimal"), CurrencyCode::MYR)
}

fn settings() -> StoreSettings {
    StoreSettings {
        shipping_fee: Decimal::new(800, 2),
        free_shipping_threshold: Some(Decimal::new(15000, 2)),
        tax_rate: Decimal::new(6, 0),
        ..StoreSettings::default()
    }
}

#[test]
fn test_quote_below_free_shipping() {
    let lines = [
        PricedLine {
            unit_price: myr("25.00"),
            quantity: 2,
        },
        PricedLine {
            unit_price: myr("9.90"),
            quantity: 1,
        },
    ];
    let totals = quote(&lines, &settings()).expect("quote");

    assert_eq!(totals.subtotal.amount, "59.90".parse::<Decimal>().expect("decimal"));
    assert_eq!(totals.shipping.amount, Decimal::new(800, 2));
    assert_eq!(totals.tax.amount, Decimal::new(359, 2));
    assert_eq!(
        totals.total.amount,
        totals.subtotal.amount + totals.shipping.amount + totals.tax.amount
    );
    assert_eq!(totals.item_count, 3);
}

#[test]
fn test_quote_reaching_threshold_ships_free() {
    let lines = [PricedLine {
        unit_price: myr("150.00"),
        quantity: 1,
    }];
    let totals = quote(&lines, &settings()).expect("quote");
    assert!(totals.shipping.amount.is_zero());
}

#[test]
fn test_empty_cart_costs_nothing() {
    let totals = quote(&[], &settings()).expect("quote");
    assert!(totals.total.amount.is_zero());
    assert_eq!(totals.item_count, 0);
}

#[test]
fn test_happy_path_is_allowed() {
    let path = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Refunded,
    ];
    for pair in path.windows(2) {
        if let &[from, to] = pair {
            assert!(check_transition(from, to).is_ok(), "{from} -> {to}");
        }
    }
}

#[test]
fn test_terminal_states_go_nowhere() {
    for from in [OrderStatus::Cancelled, OrderStatus::Refunded] {
        for to in OrderStatus::ALL {
            assert!(matches!(
                check_transition(from, to),
                Err(LifecycleError::InvalidTransition { .. })
            ));
        }
    }
}

#[test]
fn test_cannot_skip_payment() {
    assert!(check_transition(OrderStatus::Pending, OrderStatus::Shipped).is_err());
    assert!(check_transition(OrderStatus::Pending, OrderStatus::Refunded).is_err());
}

#[test]
fn test_restock_and_refund_rules() {
    // Unshipped paid orders return stock and money.
    assert!(OrderStatus::Paid.restocks_on(OrderStatus::Cancelled));
    assert!(OrderStatus::Processing.refunds_on(OrderStatus::Refunded));

    // Shipped goods are refunded but not restocked.
    assert!(!OrderStatus::Shipped.restocks_on(OrderStatus::Refunded));
    assert!(OrderStatus::Shipped.refunds_on(OrderStatus::Refunded));

    // Unpaid orders have nothing to refund or restock.
    assert!(!OrderStatus::Pending.restocks_on(OrderStatus::Cancelled));
    assert!(!OrderStatus::Pending.refunds_on(OrderStatus::Cancelled));
}

#[test]
fn test_customer_notification_mentions_order() {
    let (title, body) = notification_text("KD-20260101-ABC123", OrderStatus::Shipped);
    assert!(title.contains("KD-20260101-ABC123"));
    assert!(!body.is_empty());
}

#[test]
fn test_parcel_weight() {
    let lines = [
        ShippingLine {
            weight_grams: Some(250),
            quantity: 2,
        },
        ShippingLine {
            weight_grams: None,
            quantity: 5,
        },
    ];
    assert_eq!(parcel_weight_kg(&lines), Decimal::new(5, 1));
}
