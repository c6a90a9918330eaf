//! Product, variant and stock management.
//!
//! Stock changes are single guarded `UPDATE`s so concurrent adjustments and
//! webhook decrements never race each other into negative stock.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use kedai_core::{CategoryId, CurrencyCode, PageRequest, Paginated, ProductId, VariantId};

use super::{RepositoryError, like_pattern};
use crate::models::{AdminProduct, AdminProductSummary, AdminVariant, LowStockVariant};

// =============================================================================
// Inputs
// =============================================================================

/// Fully resolved product fields, used for both insert and update.
#[derive(Debug, Clone)]
pub struct ProductFields {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub base_price: Decimal,
    pub weight_grams: Option<i32>,
    pub is_active: bool,
    pub is_featured: bool,
}

/// Fully resolved variant fields, used for both insert and update.
#[derive(Debug, Clone)]
pub struct VariantFields {
    pub sku: String,
    pub name: String,
    pub price: Option<Decimal>,
    pub stock_quantity: i32,
    pub weight_grams: Option<i32>,
    pub is_active: bool,
}

/// Product list filters.
#[derive(Debug, Clone, Default)]
pub struct ProductListFilter {
    pub q: Option<String>,
    pub category_id: Option<CategoryId>,
    pub active: Option<bool>,
}

/// What a delete request actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    /// Ordered products are kept for order history and deactivated instead.
    Archived,
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: ProductId,
    name: String,
    slug: String,
    category_id: Option<CategoryId>,
    category_name: Option<String>,
    base_price: Decimal,
    currency: CurrencyCode,
    is_active: bool,
    is_featured: bool,
    variant_count: i64,
    total_stock: i64,
    image_url: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<SummaryRow> for AdminProductSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            category_id: row.category_id,
            category_name: row.category_name,
            base_price: row.base_price,
            currency: row.currency,
            is_active: row.is_active,
            is_featured: row.is_featured,
            variant_count: row.variant_count,
            total_stock: row.total_stock,
            primary_image_url: row.image_url,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    description: Option<String>,
    category_id: Option<CategoryId>,
    base_price: Decimal,
    currency: CurrencyCode,
    weight_grams: Option<i32>,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: VariantId,
    product_id: ProductId,
    sku: String,
    name: String,
    price: Option<Decimal>,
    stock_quantity: i32,
    weight_grams: Option<i32>,
    is_active: bool,
    updated_at: DateTime<Utc>,
}

impl From<VariantRow> for AdminVariant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            sku: row.sku,
            name: row.name,
            price: row.price,
            stock_quantity: row.stock_quantity,
            weight_grams: row.weight_grams,
            is_active: row.is_active,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LowStockRow {
    variant_id: VariantId,
    product_id: ProductId,
    product_name: String,
    variant_name: String,
    sku: String,
    stock_quantity: i32,
}

impl From<LowStockRow> for LowStockVariant {
    fn from(row: LowStockRow) -> Self {
        Self {
            variant_id: row.variant_id,
            product_id: row.product_id,
            product_name: row.product_name,
            variant_name: row.variant_name,
            sku: row.sku,
            stock_quantity: row.stock_quantity,
        }
    }
}

const VARIANT_COLUMNS: &str =
    "id, product_id, sku, name, price, stock_quantity, weight_grams, is_active, updated_at";

const LIST_FILTER: &str = r"
    WHERE ($1::text IS NULL OR p.name ILIKE $1 OR p.slug ILIKE $1
           OR EXISTS (SELECT 1 FROM product_variants v WHERE v.product_id = p.id AND v.sku ILIKE $1))
      AND ($2::uuid IS NULL OR p.category_id = $2)
      AND ($3::boolean IS NULL OR p.is_active = $3)
";

// =============================================================================
// Repository
// =============================================================================

/// Repository for product and variant database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Paginated product list including inactive products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductListFilter,
        page: PageRequest,
    ) -> Result<Paginated<AdminProductSummary>, RepositoryError> {
        let pattern = like_pattern(filter.q.as_deref());

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products p {LIST_FILTER}"))
                .bind(pattern.as_deref())
                .bind(filter.category_id)
                .bind(filter.active)
                .fetch_one(self.pool)
                .await?;

        let rows = sqlx::query_as::<_, SummaryRow>(&format!(
            r"
            SELECT p.id, p.name, p.slug, p.category_id, c.name AS category_name,
                   p.base_price, p.currency, p.is_active, p.is_featured, p.updated_at,
                   (SELECT COUNT(*) FROM product_variants v WHERE v.product_id = p.id)
                       AS variant_count,
                   (SELECT COALESCE(SUM(v.stock_quantity), 0)::bigint
                    FROM product_variants v WHERE v.product_id = p.id) AS total_stock,
                   (SELECT i.url FROM product_images i
                    WHERE i.product_id = p.id
                    ORDER BY i.is_primary DESC, i.sort_order
                    LIMIT 1) AS image_url
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            {LIST_FILTER}
            ORDER BY p.updated_at DESC, p.id
            LIMIT $4 OFFSET $5
            "
        ))
        .bind(pattern.as_deref())
        .bind(filter.category_id)
        .bind(filter.active)
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

    /// A product with all variants and images.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<AdminProduct>, RepositoryError> {
        let Some(product) = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, slug, description, category_id, base_price, currency,
                   weight_grams, is_active, is_featured, created_at, updated_at
            FROM products
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let variants = sqlx::query_as::<_, VariantRow>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = $1 ORDER BY created_at, sku"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let images = super::images::ImageRepository::new(self.pool)
            .list_for_product(id)
            .await?;

        Ok(Some(AdminProduct {
            id: product.id,
            name: product.name,
            slug: product.slug,
            description: product.description,
            category_id: product.category_id,
            base_price: product.base_price,
            currency: product.currency,
            weight_grams: product.weight_grams,
            is_active: product.is_active,
            is_featured: product.is_featured,
            variants: variants.into_iter().map(Into::into).collect(),
            images,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }))
    }

    /// Insert a product priced in the store currency.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a duplicate slug or unknown category.
    pub async fn create(
        &self,
        fields: &ProductFields,
        currency: CurrencyCode,
    ) -> Result<ProductId, RepositoryError> {
        let id = sqlx::query_scalar::<_, ProductId>(
            r"
            INSERT INTO products
                (name, slug, description, category_id, base_price, currency,
                 weight_grams, is_active, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            ",
        )
        .bind(&fields.name)
        .bind(&fields.slug)
        .bind(fields.description.as_deref())
        .bind(fields.category_id)
        .bind(fields.base_price)
        .bind(currency)
        .bind(fields.weight_grams)
        .bind(fields.is_active)
        .bind(fields.is_featured)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "product slug or category is invalid"))?;

        Ok(id)
    }

    /// Overwrite a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` on a duplicate slug or unknown category.
    pub async fn update(&self, id: ProductId, fields: &ProductFields) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET name = $2, slug = $3, description = $4, category_id = $5, base_price = $6,
                weight_grams = $7, is_active = $8, is_featured = $9, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.slug)
        .bind(fields.description.as_deref())
        .bind(fields.category_id)
        .bind(fields.base_price)
        .bind(fields.weight_grams)
        .bind(fields.is_active)
        .bind(fields.is_featured)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "product slug or category is invalid"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete a product, or archive it if any order references it.
    ///
    /// Returns the storage paths of deleted images so the caller can remove
    /// the objects.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete_or_archive(
        &self,
        id: ProductId,
    ) -> Result<(DeleteOutcome, Vec<String>), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, ProductId>(
            "SELECT id FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let ordered = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM order_items WHERE product_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if ordered {
            sqlx::query("UPDATE products SET is_active = FALSE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok((DeleteOutcome::Archived, Vec::new()));
        }

        let paths = sqlx::query_scalar::<_, String>(
            "SELECT storage_path FROM product_images WHERE product_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((DeleteOutcome::Deleted, paths))
    }

    // -------------------------------------------------------------------------
    // Variants
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_variant(&self, id: VariantId) -> Result<Option<AdminVariant>, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Add a variant to a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a duplicate SKU or unknown product.
    pub async fn create_variant(
        &self,
        product_id: ProductId,
        fields: &VariantFields,
    ) -> Result<AdminVariant, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(&format!(
            r"
            INSERT INTO product_variants
                (product_id, sku, name, price, stock_quantity, weight_grams, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {VARIANT_COLUMNS}
            "
        ))
        .bind(product_id)
        .bind(&fields.sku)
        .bind(&fields.name)
        .bind(fields.price)
        .bind(fields.stock_quantity)
        .bind(fields.weight_grams)
        .bind(fields.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "SKU already exists"))?;

        Ok(row.into())
    }

    /// Overwrite a variant's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    /// Returns `RepositoryError::Conflict` on a duplicate SKU.
    pub async fn update_variant(
        &self,
        id: VariantId,
        fields: &VariantFields,
    ) -> Result<AdminVariant, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(&format!(
            r"
            UPDATE product_variants
            SET sku = $2, name = $3, price = $4, stock_quantity = $5, weight_grams = $6,
                is_active = $7, updated_at = now()
            WHERE id = $1
            RETURNING {VARIANT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&fields.sku)
        .bind(&fields.name)
        .bind(fields.price)
        .bind(fields.stock_quantity)
        .bind(fields.weight_grams)
        .bind(fields.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "SKU already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    pub async fn delete_variant(&self, id: VariantId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM product_variants WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Add `delta` (possibly negative) to a variant's stock.
    ///
    /// Returns the new quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the result would be negative.
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    pub async fn adjust_stock(&self, id: VariantId, delta: i32) -> Result<i32, RepositoryError> {
        let updated = sqlx::query_scalar::<_, i32>(
            r"
            UPDATE product_variants
            SET stock_quantity = stock_quantity + $2, updated_at = now()
            WHERE id = $1 AND stock_quantity + $2 >= 0
            RETURNING stock_quantity
            ",
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await?;

        if let Some(quantity) = updated {
            return Ok(quantity);
        }

        match self.get_variant(id).await? {
            Some(_) => Err(RepositoryError::Conflict(
                "stock cannot go below zero".to_string(),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Set a variant's stock to an absolute value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant does not exist.
    pub async fn set_stock(&self, id: VariantId, quantity: i32) -> Result<i32, RepositoryError> {
        sqlx::query_scalar::<_, i32>(
            r"
            UPDATE product_variants
            SET stock_quantity = $2, updated_at = now()
            WHERE id = $1
            RETURNING stock_quantity
            ",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Active variants of active products at or below `threshold`, emptiest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<LowStockVariant>, RepositoryError> {
        let rows = sqlx::query_as::<_, LowStockRow>(
            r"
            SELECT v.id AS variant_id, p.id AS product_id, p.name AS product_name,
                   v.name AS variant_name, v.sku, v.stock_quantity
            FROM product_variants v
            JOIN products p ON p.id = v.product_id
            WHERE v.is_active AND p.is_active AND v.stock_quantity <= $1
            ORDER BY v.stock_quantity, p.name, v.sku
            ",
        )
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
