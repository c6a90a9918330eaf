//! Read-only catalog queries.
//!
//! Only active products with at least one active variant are visible to
//! shoppers. Effective variant price is `COALESCE(variant.price, product.base_price)`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use kedai_core::{
    CategoryId, CurrencyCode, PageRequest, Paginated, Price, ProductId, ProductImageId, VariantId,
};

use super::RepositoryError;
use crate::models::{
    Category, ProductDetail, ProductFilter, ProductImage, ProductSummary, RatingSummary, Variant,
};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: Option<String>,
    parent_id: Option<CategoryId>,
    sort_order: i32,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            parent_id: row.parent_id,
            sort_order: row.sort_order,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductSummaryRow {
    id: ProductId,
    name: String,
    slug: String,
    category_id: Option<CategoryId>,
    currency: CurrencyCode,
    is_featured: bool,
    created_at: DateTime<Utc>,
    from_price: Decimal,
    in_stock: bool,
    image_url: Option<String>,
    average_rating: Option<f64>,
    review_count: i64,
}

impl From<ProductSummaryRow> for ProductSummary {
    fn from(row: ProductSummaryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            category_id: row.category_id,
            from_price: Price::new(row.from_price, row.currency),
            primary_image_url: row.image_url,
            in_stock: row.in_stock,
            is_featured: row.is_featured,
            average_rating: row.average_rating.map(|avg| (avg * 10.0).round() / 10.0),
            review_count: row.review_count,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: Option<String>,
    base_price: Decimal,
    currency: CurrencyCode,
    weight_grams: Option<i32>,
    is_featured: bool,
    category_id: Option<CategoryId>,
    category_name: Option<String>,
    category_slug: Option<String>,
    category_description: Option<String>,
    category_parent_id: Option<CategoryId>,
    category_sort_order: Option<i32>,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: VariantId,
    sku: String,
    name: String,
    price: Decimal,
    stock_quantity: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: ProductImageId,
    url: String,
    alt_text: Option<String>,
    is_primary: bool,
    sort_order: i32,
}

impl From<ImageRow> for ProductImage {
    fn from(row: ImageRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            alt_text: row.alt_text,
            is_primary: row.is_primary,
            sort_order: row.sort_order,
        }
    }
}

/// Current state of a variant, used by cart mutations.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VariantAvailability {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    /// Both the variant and its product are active.
    pub active: bool,
    pub stock_quantity: i32,
}

// =============================================================================
// Queries
// =============================================================================

/// Shared `FROM`/`WHERE` for product listings and their counts.
const LISTING_FROM: &str = r"
    FROM products p
    JOIN (
        SELECT v.product_id,
               MIN(COALESCE(v.price, pp.base_price)) AS from_price,
               BOOL_OR(v.stock_quantity > 0) AS in_stock
        FROM product_variants v
        JOIN products pp ON pp.id = v.product_id
        WHERE v.is_active
        GROUP BY v.product_id
    ) vs ON vs.product_id = p.id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN (
        SELECT product_id, AVG(rating)::float8 AS average_rating, COUNT(*) AS review_count
        FROM product_reviews
        WHERE status = 'approved'
        GROUP BY product_id
    ) rs ON rs.product_id = p.id
    WHERE p.is_active
      AND ($1::text IS NULL OR c.slug = $1)
      AND ($2::text IS NULL OR p.name ILIKE $2 OR p.description ILIKE $2)
      AND ($3::numeric IS NULL OR vs.from_price >= $3)
      AND ($4::numeric IS NULL OR vs.from_price <= $4)
";

/// Repository for catalog reads.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories ordered for navigation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT id, name, slug, description, parent_id, sort_order
            FROM categories
            ORDER BY sort_order, name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Paginated product listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Paginated<ProductSummary>, RepositoryError> {
        let pattern = filter.search_pattern();
        let category = filter.category_slug();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {LISTING_FROM}"))
            .bind(category)
            .bind(pattern.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .fetch_one(self.pool)
            .await?;

        let sql = format!(
            r"
            SELECT p.id, p.name, p.slug, p.category_id, p.currency, p.is_featured, p.created_at,
                   vs.from_price, vs.in_stock,
                   (SELECT i.url FROM product_images i
                    WHERE i.product_id = p.id
                    ORDER BY i.is_primary DESC, i.sort_order
                    LIMIT 1) AS image_url,
                   rs.average_rating,
                   COALESCE(rs.review_count, 0) AS review_count
            {LISTING_FROM}
            ORDER BY {order_by}
            LIMIT $5 OFFSET $6
            ",
            order_by = filter.sort.order_by(),
        );

        let rows = sqlx::query_as::<_, ProductSummaryRow>(&sql)
            .bind(category)
            .bind(pattern.as_deref())
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        Ok(Paginated::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            total,
        ))
    }

    /// Product page by slug. Inactive products are treated as missing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn get_product_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<ProductDetail>, RepositoryError> {
        let Some(product) = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.name, p.slug, p.description, p.base_price, p.currency,
                   p.weight_grams, p.is_featured, p.category_id,
                   c.name AS category_name, c.slug AS category_slug,
                   c.description AS category_description,
                   c.parent_id AS category_parent_id, c.sort_order AS category_sort_order
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE p.slug = $1 AND p.is_active
            ",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let variants = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT v.id, v.sku, v.name, COALESCE(v.price, $2) AS price, v.stock_quantity
            FROM product_variants v
            WHERE v.product_id = $1 AND v.is_active
            ORDER BY COALESCE(v.price, $2), v.name
            ",
        )
        .bind(product.id)
        .bind(product.base_price)
        .fetch_all(self.pool)
        .await?;

        if variants.is_empty() {
            return Ok(None);
        }

        let images = sqlx::query_as::<_, ImageRow>(
            r"
            SELECT id, url, alt_text, is_primary, sort_order
            FROM product_images
            WHERE product_id = $1
            ORDER BY is_primary DESC, sort_order, created_at
            ",
        )
        .bind(product.id)
        .fetch_all(self.pool)
        .await?;

        let rating = self.rating_summary(product.id).await?;

        let category = match (
            product.category_id,
            product.category_name,
            product.category_slug,
        ) {
            (Some(id), Some(name), Some(slug)) => Some(Category {
                id,
                name,
                slug,
                description: product.category_description,
                parent_id: product.category_parent_id,
                sort_order: product.category_sort_order.unwrap_or_default(),
            }),
            _ => None,
        };

        let currency = product.currency;
        Ok(Some(ProductDetail {
            id: product.id,
            name: product.name,
            slug: product.slug,
            description: product.description,
            category,
            base_price: Price::new(product.base_price, currency),
            weight_grams: product.weight_grams,
            is_featured: product.is_featured,
            variants: variants
                .into_iter()
                .map(|v| Variant {
                    id: v.id,
                    sku: v.sku,
                    name: v.name,
                    price: Price::new(v.price, currency),
                    stock_quantity: v.stock_quantity,
                    in_stock: v.stock_quantity > 0,
                })
                .collect(),
            images: images.into_iter().map(Into::into).collect(),
            rating,
        }))
    }

    /// Approved-review summary for a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn rating_summary(
        &self,
        product_id: ProductId,
    ) -> Result<RatingSummary, RepositoryError> {
        let counts: Vec<(i16, i64)> = sqlx::query_as(
            r"
            SELECT rating, COUNT(*)
            FROM product_reviews
            WHERE product_id = $1 AND status = 'approved'
            GROUP BY rating
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(RatingSummary::from_counts(&counts))
    }

    /// Resolve an active product's ID from its slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_id_by_slug(&self, slug: &str) -> Result<Option<ProductId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, ProductId>(
            "SELECT id FROM products WHERE slug = $1 AND is_active",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    /// Current availability of a single variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variant_availability(
        &self,
        variant_id: VariantId,
    ) -> Result<Option<VariantAvailability>, RepositoryError> {
        let row = sqlx::query_as::<_, VariantAvailability>(
            r"
            SELECT v.id AS variant_id, v.product_id, v.sku,
                   (v.is_active AND p.is_active) AS active,
                   v.stock_quantity
            FROM product_variants v
            JOIN products p ON p.id = v.product_id
            WHERE v.id = $1
            ",
        )
        .bind(variant_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }
}
