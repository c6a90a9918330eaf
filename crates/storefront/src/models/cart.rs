//! Cart view models.

use serde::Serialize;

use kedai_core::cart::LineIssue;
use kedai_core::pricing::OrderTotals;
use kedai_core::{CartItemId, Price, ProductId, VariantId};

/// One line in the customer's cart, priced at current catalog prices.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub variant_name: String,
    pub sku: String,
    pub image_url: Option<String>,
    pub unit_price: Price,
    pub quantity: i32,
    pub line_total: Price,
    /// Units currently in stock.
    pub available: i32,
    pub issue: Option<LineIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub totals: OrderTotals,
    /// False when the cart is empty or any line has an issue.
    pub can_checkout: bool,
}
