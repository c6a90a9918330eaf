//! Checkout: cart to pending order to Stripe Checkout Session.
//!
//! The order is written before Stripe is called so the session can carry the
//! order ID. Nothing is taken from stock here; stock moves only when the
//! payment webhook materializes the order.

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use kedai_core::cart::line_issue;
use kedai_core::pricing::{PricedLine, PricingError, quote};
use kedai_core::{
    AddressError, OrderId, Price, ShippingAddress, StoreSettings, order_number,
};

use crate::db::cart::CartLineRow;
use crate::db::orders::{NewOrder, NewOrderItem};
use crate::db::{CartRepository, OrderRepository, RepositoryError};
use crate::models::CurrentUser;
use crate::stripe::{CheckoutLine, CheckoutSessionParams, StripeClient, StripeError};

/// Longest accepted order note.
pub const MAX_NOTES_LENGTH: usize = 500;

/// Attempts at a fresh order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,

    /// SKUs that are inactive or short on stock.
    #[error("some items are no longer available: {}", .0.join(", "))]
    StockConflict(Vec<String>),

    #[error("invalid shipping address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("notes must be at most {MAX_NOTES_LENGTH} characters")]
    NotesTooLong,

    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("payment provider error: {0}")]
    Payment(#[from] StripeError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What the client needs to redirect the buyer to Stripe.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStarted {
    pub order_id: OrderId,
    pub order_number: String,
    pub checkout_url: String,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    cart: CartRepository<'a>,
    orders: OrderRepository<'a>,
    stripe: &'a StripeClient,
    base_url: &'a str,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, base_url: &'a str) -> Self {
        Self {
            cart: CartRepository::new(pool),
            orders: OrderRepository::new(pool),
            stripe,
            base_url,
        }
    }

    /// Turn the customer's cart into a pending order and a Checkout Session.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` for empty carts, stock conflicts, invalid input,
    /// database failures, or when Stripe rejects the session (the order is
    /// then cancelled).
    #[tracing::instrument(skip_all, fields(profile_id = %user.id))]
    pub async fn start(
        &self,
        user: &CurrentUser,
        shipping_address: ShippingAddress,
        notes: Option<String>,
        settings: &StoreSettings,
    ) -> Result<CheckoutStarted, CheckoutError> {
        let shipping_address = shipping_address.validate()?;
        let notes = normalize_notes(notes)?;

        let rows = self.cart.lines(user.id).await?;
        let draft = draft_order(&rows, settings)?;

        let (order_id, number) = self
            .insert_order(user, &draft, &shipping_address, notes.as_deref())
            .await?;

        let params = CheckoutSessionParams {
            order_id: order_id.to_string(),
            order_number: number.clone(),
            customer_email: user.email.as_str().to_owned(),
            currency: settings.currency,
            lines: draft.stripe_lines,
            shipping: draft.totals.shipping,
            tax: draft.totals.tax,
            success_url: format!(
                "{}/checkout/success?order_id={order_id}&session_id={{CHECKOUT_SESSION_ID}}",
                self.base_url
            ),
            cancel_url: format!("{}/cart?checkout=cancelled", self.base_url),
        };

        let session = match self.stripe.create_checkout_session(&params).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, order_number = %number, "Stripe checkout session failed");
                self.orders
                    .fail_pending(order_id, "payment session could not be created")
                    .await?;
                return Err(e.into());
            }
        };

        let Some(checkout_url) = session.url else {
            self.orders
                .fail_pending(order_id, "payment session has no URL")
                .await?;
            return Err(StripeError::Parse("checkout session without url".to_owned()).into());
        };

        self.orders.set_stripe_session(order_id, &session.id).await?;

        tracing::info!(order_number = %number, "Checkout started");

        Ok(CheckoutStarted {
            order_id,
            order_number: number,
            checkout_url,
        })
    }

    async fn insert_order(
        &self,
        user: &CurrentUser,
        draft: &DraftOrder,
        shipping_address: &ShippingAddress,
        notes: Option<&str>,
    ) -> Result<(OrderId, String), CheckoutError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let number = order_number::generate(chrono::Utc::now(), &mut rand::rng());
            let order = NewOrder {
                order_number: &number,
                profile_id: user.id,
                contact_email: &user.email,
                totals: &draft.totals,
                shipping_address,
                notes,
            };
            match self.orders.create_pending(&order, &draft.items).await {
                Ok(id) => return Ok((id, number)),
                Err(RepositoryError::Conflict(_)) if attempt < ORDER_NUMBER_ATTEMPTS => {
                    tracing::warn!(order_number = %number, "Order number collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Priced snapshot of a cart, ready to be written as an order.
#[derive(Debug)]
struct DraftOrder {
    items: Vec<NewOrderItem>,
    stripe_lines: Vec<CheckoutLine>,
    totals: kedai_core::pricing::OrderTotals,
}

/// Check every line against live stock and price the cart.
fn draft_order(rows: &[CartLineRow], settings: &StoreSettings) -> Result<DraftOrder, CheckoutError> {
    if rows.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let conflicts: Vec<String> = rows
        .iter()
        .filter(|r| line_issue(r.active, r.stock_quantity, r.quantity).is_some())
        .map(|r| r.sku.clone())
        .collect();
    if !conflicts.is_empty() {
        return Err(CheckoutError::StockConflict(conflicts));
    }

    let mut items = Vec::with_capacity(rows.len());
    let mut stripe_lines = Vec::with_capacity(rows.len());
    let mut priced = Vec::with_capacity(rows.len());

    for row in rows {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            CheckoutError::StockConflict(vec![row.sku.clone()])
        })?;
        let unit_price = Price::new(row.unit_price, row.currency);
        let line_total = unit_price.times(quantity).map_err(PricingError::from)?;

        priced.push(PricedLine {
            unit_price,
            quantity,
        });
        stripe_lines.push(CheckoutLine {
            name: format!("{} - {}", row.product_name, row.variant_name),
            unit_price,
            quantity,
        });
        items.push(NewOrderItem {
            product_id: row.product_id,
            variant_id: row.variant_id,
            product_name: row.product_name.clone(),
            variant_name: row.variant_name.clone(),
            sku: row.sku.clone(),
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: line_total.amount,
            weight_grams: row.weight_grams,
        });
    }

    let totals = quote(&priced, settings)?;

    Ok(DraftOrder {
        items,
        stripe_lines,
        totals,
    })
}

fn normalize_notes(notes: Option<String>) -> Result<Option<String>, CheckoutError> {
    let Some(notes) = notes else {
        return Ok(None);
    };
    let trimmed = notes.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_NOTES_LENGTH {
        return Err(CheckoutError::NotesTooLong);
    }
    Ok(Some(trimmed.to_owned()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kedai_core::{CartItemId, CurrencyCode, ProductId, VariantId};
    use rust_decimal::Decimal;

    fn row(sku: &str, price: &str, quantity: i32, stock: i32) -> CartLineRow {
        CartLineRow {
            id: CartItemId::generate(),
            variant_id: VariantId::generate(),
            product_id: ProductId::generate(),
            product_name: "Sambal".to_owned(),
            product_slug: "sambal".to_owned(),
            variant_name: "Pedas".to_owned(),
            sku: sku.to_owned(),
            image_url: None,
            unit_price: price.parse().unwrap(),
            currency: CurrencyCode::MYR,
            quantity,
            stock_quantity: stock,
            active: true,
            weight_grams: None,
        }
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert!(matches!(
            draft_order(&[], &StoreSettings::default()),
            Err(CheckoutError::EmptyCart)
        ));
    }

    #[test]
    fn test_stock_conflicts_list_skus() {
        let rows = [row("A", "10.00", 1, 5), row("B", "10.00", 3, 2), row("C", "1.00", 1, 0)];
        let Err(CheckoutError::StockConflict(skus)) = draft_order(&rows, &StoreSettings::default())
        else {
            panic!("expected stock conflict");
        };
        assert_eq!(skus, vec!["B".to_owned(), "C".to_owned()]);
    }

    #[test]
    fn test_draft_snapshots_lines_and_totals() {
        let settings = StoreSettings::default();
        let draft = draft_order(&[row("A", "12.50", 2, 5)], &settings).unwrap();
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].line_total, Decimal::new(2500, 2));
        assert_eq!(draft.stripe_lines[0].name, "Sambal - Pedas");
        assert_eq!(draft.totals.subtotal.amount, Decimal::new(2500, 2));
        assert_eq!(draft.totals.shipping.amount, settings.shipping_fee);
    }

    #[test]
    fn test_notes() {
        assert_eq!(normalize_notes(None).unwrap(), None);
        assert_eq!(normalize_notes(Some("   ".to_owned())).unwrap(), None);
        assert_eq!(
            normalize_notes(Some(" leave at guard house ".to_owned())).unwrap(),
            Some("leave at guard house".to_owned())
        );
        assert!(matches!(
            normalize_notes(Some("x".repeat(MAX_NOTES_LENGTH + 1))),
            Err(CheckoutError::NotesTooLong)
        ));
    }
}
