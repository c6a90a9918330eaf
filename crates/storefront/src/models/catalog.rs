//! Catalog models: categories, products, variants and images.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kedai_core::{CategoryId, Price, ProductId, ProductImageId, VariantId};

use super::review::RatingSummary;

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub sort_order: i32,
}

/// A product card in listings.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub category_id: Option<CategoryId>,
    /// Lowest effective price across active variants.
    pub from_price: Price,
    pub primary_image_url: Option<String>,
    pub in_stock: bool,
    pub is_featured: bool,
    pub average_rating: Option<f64>,
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A purchasable variant.
#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub id: VariantId,
    pub sku: String,
    pub name: String,
    /// Variant override or the product's base price.
    pub price: Price,
    pub stock_quantity: i32,
    pub in_stock: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub url: String,
    pub alt_text: Option<String>,
    pub is_primary: bool,
    pub sort_order: i32,
}

/// Full product page.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub base_price: Price,
    pub weight_grams: Option<i32>,
    pub is_featured: bool,
    pub variants: Vec<Variant>,
    pub images: Vec<ProductImage>,
    pub rating: RatingSummary,
}

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    /// SQL `ORDER BY` clause. Only ever one of these fixed strings.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id",
            Self::PriceAsc => "vs.from_price ASC, p.name",
            Self::PriceDesc => "vs.from_price DESC, p.name",
            Self::Name => "p.name ASC, p.id",
        }
    }
}

/// Listing filters from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    /// Free-text search on name and description.
    pub q: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
}

impl ProductFilter {
    /// `ILIKE` pattern for the search term, with wildcards in the input escaped.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        let q = self.q.as_deref()?.trim();
        if q.is_empty() {
            return None;
        }
        let escaped = q
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{escaped}%"))
    }

    /// Category slug, ignoring blanks.
    #[must_use]
    pub fn category_slug(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let filter = ProductFilter {
            q: Some(" 100%_kopi ".into()),
            ..ProductFilter::default()
        };
        assert_eq!(filter.search_pattern().as_deref(), Some("%100\\%\\_kopi%"));
    }

    #[test]
    fn test_blank_filters_are_ignored() {
        let filter = ProductFilter {
            q: Some("   ".into()),
            category: Some(String::new()),
            ..ProductFilter::default()
        };
        assert_eq!(filter.search_pattern(), None);
        assert_eq!(filter.category_slug(), None);
    }

    #[test]
    fn test_sort_parses_snake_case() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap_or_default();
        assert_eq!(sort, ProductSort::PriceDesc);
    }
}
