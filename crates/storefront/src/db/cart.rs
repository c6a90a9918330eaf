//! Server-side cart storage.
//!
//! Every query is scoped by `profile_id`, so a customer can never read or
//! modify another customer's lines even with a guessed line ID.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use kedai_core::{CartItemId, CurrencyCode, ProductId, ProfileId, VariantId};

use super::RepositoryError;

/// A cart line joined with the current catalog state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLineRow {
    pub id: CartItemId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_slug: String,
    pub variant_name: String,
    pub sku: String,
    pub image_url: Option<String>,
    /// Effective unit price right now.
    pub unit_price: Decimal,
    pub currency: CurrencyCode,
    pub quantity: i32,
    pub stock_quantity: i32,
    /// Both the variant and its product are active.
    pub active: bool,
    pub weight_grams: Option<i32>,
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All lines in a customer's cart, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, profile_id: ProfileId) -> Result<Vec<CartLineRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.id, ci.variant_id, p.id AS product_id,
                   p.name AS product_name, p.slug AS product_slug,
                   v.name AS variant_name, v.sku,
                   (SELECT i.url FROM product_images i
                    WHERE i.product_id = p.id
                    ORDER BY i.is_primary DESC, i.sort_order
                    LIMIT 1) AS image_url,
                   COALESCE(v.price, p.base_price) AS unit_price,
                   p.currency,
                   ci.quantity,
                   v.stock_quantity,
                   (v.is_active AND p.is_active) AS active,
                   COALESCE(v.weight_grams, p.weight_grams) AS weight_grams
            FROM cart_items ci
            JOIN product_variants v ON v.id = ci.variant_id
            JOIN products p ON p.id = v.product_id
            WHERE ci.profile_id = $1
            ORDER BY ci.created_at, ci.id
            ",
        )
        .bind(profile_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Quantity already in the cart for a variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        profile_id: ProfileId,
        variant_id: VariantId,
    ) -> Result<Option<i32>, RepositoryError> {
        let quantity = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM cart_items WHERE profile_id = $1 AND variant_id = $2",
        )
        .bind(profile_id)
        .bind(variant_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(quantity)
    }

    /// The variant behind one of the customer's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn line_variant(
        &self,
        profile_id: ProfileId,
        item_id: CartItemId,
    ) -> Result<Option<VariantId>, RepositoryError> {
        let variant = sqlx::query_scalar::<_, VariantId>(
            "SELECT variant_id FROM cart_items WHERE id = $1 AND profile_id = $2",
        )
        .bind(item_id)
        .bind(profile_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(variant)
    }

    /// Insert a line or overwrite the quantity of the existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        profile_id: ProfileId,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<CartItemId, RepositoryError> {
        let id = sqlx::query_scalar::<_, CartItemId>(
            r"
            INSERT INTO cart_items (profile_id, variant_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (profile_id, variant_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = now()
            RETURNING id
            ",
        )
        .bind(profile_id)
        .bind(variant_id)
        .bind(quantity)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not the customer's.
    pub async fn set_quantity(
        &self,
        profile_id: ProfileId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE cart_items SET quantity = $3, updated_at = now()
            WHERE id = $1 AND profile_id = $2
            ",
        )
        .bind(item_id)
        .bind(profile_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove one line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not the customer's.
    pub async fn remove(
        &self,
        profile_id: ProfileId,
        item_id: CartItemId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND profile_id = $2")
            .bind(item_id)
            .bind(profile_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Empty the cart. Returns the number of lines removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, profile_id: ProfileId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE profile_id = $1")
            .bind(profile_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Drop purchased variants from a buyer's cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn remove_variants(
    conn: &mut PgConnection,
    profile_id: ProfileId,
    variant_ids: &[VariantId],
) -> Result<u64, RepositoryError> {
    let result =
        sqlx::query("DELETE FROM cart_items WHERE profile_id = $1 AND variant_id = ANY($2)")
            .bind(profile_id)
            .bind(variant_ids)
            .execute(conn)
            .await?;

    Ok(result.rows_affected())
}
