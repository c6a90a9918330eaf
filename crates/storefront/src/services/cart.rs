//! Cart service.
//!
//! Quantities merge when the same variant is added twice; every mutation
//! re-checks the variant against live stock so the cart never promises more
//! than the warehouse holds at the time of the change.

use sqlx::PgPool;
use thiserror::Error;

use kedai_core::cart::{QuantityError, line_issue, validate_quantity};
use kedai_core::pricing::{PricedLine, PricingError, quote};
use kedai_core::{CartItemId, Price, ProfileId, StoreSettings, VariantId};

use crate::db::cart::CartLineRow;
use crate::db::catalog::VariantAvailability;
use crate::db::{CartRepository, CatalogRepository, RepositoryError};
use crate::models::{CartLine, CartView};

#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Quantity(#[from] QuantityError),

    #[error("variant not found")]
    VariantNotFound,

    #[error("cart line not found")]
    LineNotFound,

    #[error("this product is no longer available")]
    Unavailable,

    #[error("only {available} left in stock")]
    InsufficientStock { available: i32 },

    #[error("pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart service.
pub struct CartService<'a> {
    cart: CartRepository<'a>,
    catalog: CatalogRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            cart: CartRepository::new(pool),
            catalog: CatalogRepository::new(pool),
        }
    }

    /// The customer's cart priced under `settings`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` or `CartError::Pricing`.
    pub async fn view(
        &self,
        profile_id: ProfileId,
        settings: &StoreSettings,
    ) -> Result<CartView, CartError> {
        let rows = self.cart.lines(profile_id).await?;
        Ok(build_view(rows, settings)?)
    }

    /// Add `quantity` of a variant, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the variant is unknown or inactive, the merged
    /// quantity is out of range, or stock is insufficient.
    pub async fn add(
        &self,
        profile_id: ProfileId,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<CartItemId, CartError> {
        validate_quantity(quantity)?;

        let variant = self.available_variant(variant_id).await?;
        let existing = self.cart.quantity_of(profile_id, variant_id).await?;
        let merged = existing.unwrap_or(0).saturating_add(quantity);

        check_line(&variant, merged)?;

        Ok(self.cart.upsert(profile_id, variant_id, merged).await?)
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line is not the customer's,
    /// plus the same checks as [`Self::add`].
    pub async fn update(
        &self,
        profile_id: ProfileId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(profile_id, item_id).await;
        }
        validate_quantity(quantity)?;

        let variant_id = self
            .cart
            .line_variant(profile_id, item_id)
            .await?
            .ok_or(CartError::LineNotFound)?;
        let variant = self.available_variant(variant_id).await?;

        check_line(&variant, quantity)?;

        self.cart
            .set_quantity(profile_id, item_id, quantity)
            .await
            .map_err(not_found_as_line)
    }

    /// Remove one line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line is not the customer's.
    pub async fn remove(&self, profile_id: ProfileId, item_id: CartItemId) -> Result<(), CartError> {
        self.cart
            .remove(profile_id, item_id)
            .await
            .map_err(not_found_as_line)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the database operation fails.
    pub async fn clear(&self, profile_id: ProfileId) -> Result<u64, CartError> {
        Ok(self.cart.clear(profile_id).await?)
    }

    async fn available_variant(
        &self,
        variant_id: VariantId,
    ) -> Result<VariantAvailability, CartError> {
        self.catalog
            .variant_availability(variant_id)
            .await?
            .ok_or(CartError::VariantNotFound)
    }
}

fn not_found_as_line(err: RepositoryError) -> CartError {
    match err {
        RepositoryError::NotFound => CartError::LineNotFound,
        other => CartError::Repository(other),
    }
}

/// Validate a line quantity against the variant's live state.
fn check_line(variant: &VariantAvailability, quantity: i32) -> Result<(), CartError> {
    validate_quantity(quantity)?;
    if !variant.active {
        return Err(CartError::Unavailable);
    }
    if quantity > variant.stock_quantity {
        return Err(CartError::InsufficientStock {
            available: variant.stock_quantity.max(0),
        });
    }
    Ok(())
}

/// Price cart rows and flag lines that cannot be bought.
///
/// # Errors
///
/// Returns `PricingError` on currency mismatch or overflow.
pub fn build_view(rows: Vec<CartLineRow>, settings: &StoreSettings) -> Result<CartView, PricingError> {
    let mut lines = Vec::with_capacity(rows.len());
    let mut priced = Vec::with_capacity(rows.len());

    for row in rows {
        let quantity = u32::try_from(row.quantity).unwrap_or(0);
        let unit_price = Price::new(row.unit_price, row.currency);
        let line_total = unit_price.times(quantity)?;
        priced.push(PricedLine {
            unit_price,
            quantity,
        });
        lines.push(CartLine {
            id: row.id,
            variant_id: row.variant_id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_slug: row.product_slug,
            variant_name: row.variant_name,
            sku: row.sku,
            image_url: row.image_url,
            unit_price,
            quantity: row.quantity,
            line_total,
            available: row.stock_quantity.max(0),
            issue: line_issue(row.active, row.stock_quantity, row.quantity),
        });
    }

    let totals = quote(&priced, settings)?;
    let can_checkout = !lines.is_empty() && lines.iter().all(|l| l.issue.is_none());

    Ok(CartView {
        lines,
        totals,
        can_checkout,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kedai_core::cart::LineIssue;
    use kedai_core::{CurrencyCode, ProductId};
    use rust_decimal::Decimal;

    fn row(price: &str, quantity: i32, stock: i32, active: bool) -> CartLineRow {
        CartLineRow {
            id: CartItemId::generate(),
            variant_id: VariantId::generate(),
            product_id: ProductId::generate(),
            product_name: "Kopi Tarik".to_owned(),
            product_slug: "kopi-tarik".to_owned(),
            variant_name: "250g".to_owned(),
            sku: "KOPI-250".to_owned(),
            image_url: None,
            unit_price: price.parse().unwrap(),
            currency: CurrencyCode::MYR,
            quantity,
            stock_quantity: stock,
            active,
            weight_grams: Some(250),
        }
    }

    fn availability(active: bool, stock: i32) -> VariantAvailability {
        VariantAvailability {
            variant_id: VariantId::generate(),
            product_id: ProductId::generate(),
            sku: "KOPI-250".to_owned(),
            active,
            stock_quantity: stock,
        }
    }

    #[test]
    fn test_view_totals_and_line_totals() {
        let settings = StoreSettings::default();
        let view = build_view(vec![row("12.50", 2, 10, true), row("5.00", 1, 3, true)], &settings)
            .unwrap();
        assert_eq!(view.lines[0].line_total.amount, Decimal::new(2500, 2));
        assert_eq!(view.totals.subtotal.amount, Decimal::new(3000, 2));
        assert_eq!(view.totals.item_count, 3);
        assert!(view.can_checkout);
    }

    #[test]
    fn test_view_flags_issues() {
        let settings = StoreSettings::default();
        let view = build_view(
            vec![
                row("10.00", 2, 1, true),
                row("10.00", 1, 0, true),
                row("10.00", 1, 5, false),
            ],
            &settings,
        )
        .unwrap();
        assert_eq!(view.lines[0].issue, Some(LineIssue::InsufficientStock));
        assert_eq!(view.lines[1].issue, Some(LineIssue::OutOfStock));
        assert_eq!(view.lines[2].issue, Some(LineIssue::Unavailable));
        assert!(!view.can_checkout);
    }

    #[test]
    fn test_empty_cart_cannot_check_out() {
        let view = build_view(Vec::new(), &StoreSettings::default()).unwrap();
        assert!(!view.can_checkout);
        assert!(view.totals.shipping.amount.is_zero());
    }

    #[test]
    fn test_check_line() {
        assert!(check_line(&availability(true, 5), 5).is_ok());
        assert!(matches!(
            check_line(&availability(true, 5), 6),
            Err(CartError::InsufficientStock { available: 5 })
        ));
        assert!(matches!(
            check_line(&availability(false, 5), 1),
            Err(CartError::Unavailable)
        ));
        assert!(matches!(
            check_line(&availability(true, 500), 100),
            Err(CartError::Quantity(QuantityError::TooLarge))
        ));
    }
}
