//! Catalog models for back-office management.
//!
//! Unlike the storefront these include inactive rows and raw variant price
//! overrides (`None` means "use the product base price").

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use kedai_core::{CategoryId, CurrencyCode, ProductId, ProductImageId, VariantId};

#[derive(Debug, Clone, Serialize)]
pub struct AdminCategory {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub sort_order: i32,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row in the product management list.
#[derive(Debug, Clone, Serialize)]
pub struct AdminProductSummary {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub base_price: Decimal,
    pub currency: CurrencyCode,
    pub is_active: bool,
    pub is_featured: bool,
    pub variant_count: i64,
    pub total_stock: i64,
    pub primary_image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    /// Price override; `None` sells at the product base price.
    pub price: Option<Decimal>,
    pub stock_quantity: i32,
    pub weight_grams: Option<i32>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub url: String,
    #[serde(skip)]
    pub storage_path: String,
    pub alt_text: Option<String>,
    pub is_primary: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub base_price: Decimal,
    pub currency: CurrencyCode,
    pub weight_grams: Option<i32>,
    pub is_active: bool,
    pub is_featured: bool,
    pub variants: Vec<AdminVariant>,
    pub images: Vec<ProductImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An active variant at or below the low-stock threshold.
#[derive(Debug, Clone, Serialize)]
pub struct LowStockVariant {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub stock_quantity: i32,
}
