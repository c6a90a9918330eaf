//! Product image rows.
//!
//! At most one image per product is primary (enforced by a partial unique
//! index), so every primary switch clears the old one first inside the same
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use kedai_core::{ProductId, ProductImageId};

use super::RepositoryError;
use crate::models::ProductImage;

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: ProductImageId,
    product_id: ProductId,
    url: String,
    storage_path: String,
    alt_text: Option<String>,
    is_primary: bool,
    sort_order: i32,
    created_at: DateTime<Utc>,
}

impl From<ImageRow> for ProductImage {
    fn from(row: ImageRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            url: row.url,
            storage_path: row.storage_path,
            alt_text: row.alt_text,
            is_primary: row.is_primary,
            sort_order: row.sort_order,
            created_at: row.created_at,
        }
    }
}

const IMAGE_COLUMNS: &str =
    "id, product_id, url, storage_path, alt_text, is_primary, sort_order, created_at";

/// An uploaded object to record against a product.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub storage_path: String,
    pub url: String,
    pub alt_text: Option<String>,
    pub is_primary: bool,
}

/// Repository for product image operations.
pub struct ImageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ImageRepository<'a> {
    /// Create a new image repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Images of a product in display order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<ProductImage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ImageRow>(&format!(
            r"
            SELECT {IMAGE_COLUMNS}
            FROM product_images
            WHERE product_id = $1
            ORDER BY is_primary DESC, sort_order, created_at
            "
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductImageId) -> Result<Option<ProductImage>, RepositoryError> {
        let row = sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT {IMAGE_COLUMNS} FROM product_images WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Record an uploaded image at the end of the product's gallery.
    ///
    /// The first image of a product always becomes primary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn create(
        &self,
        product_id: ProductId,
        image: &NewImage,
    ) -> Result<ProductImage, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_product(&mut tx, product_id).await?;

        let (count, next_order): (i64, i32) = sqlx::query_as(
            r"
            SELECT COUNT(*), COALESCE(MAX(sort_order) + 1, 0)
            FROM product_images
            WHERE product_id = $1
            ",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        let primary = image.is_primary || count == 0;
        if primary {
            clear_primary(&mut tx, product_id).await?;
        }

        let row = sqlx::query_as::<_, ImageRow>(&format!(
            r"
            INSERT INTO product_images
                (product_id, storage_path, url, alt_text, is_primary, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {IMAGE_COLUMNS}
            "
        ))
        .bind(product_id)
        .bind(&image.storage_path)
        .bind(&image.url)
        .bind(image.alt_text.as_deref())
        .bind(primary)
        .bind(next_order)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Make an image its product's primary image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image does not exist.
    pub async fn set_primary(&self, id: ProductImageId) -> Result<ProductImage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product_id = sqlx::query_scalar::<_, ProductId>(
            "SELECT product_id FROM product_images WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        lock_product(&mut tx, product_id).await?;
        clear_primary(&mut tx, product_id).await?;

        let row = sqlx::query_as::<_, ImageRow>(&format!(
            "UPDATE product_images SET is_primary = TRUE WHERE id = $1 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Delete an image row, promoting the next image if it was primary.
    ///
    /// Returns the deleted row so the caller can remove the stored object.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image does not exist.
    pub async fn delete(&self, id: ProductImageId) -> Result<ProductImage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted: ProductImage = sqlx::query_as::<_, ImageRow>(&format!(
            "DELETE FROM product_images WHERE id = $1 RETURNING {IMAGE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .into();

        if deleted.is_primary {
            sqlx::query(
                r"
                UPDATE product_images SET is_primary = TRUE
                WHERE id = (
                    SELECT id FROM product_images
                    WHERE product_id = $1
                    ORDER BY sort_order, created_at
                    LIMIT 1
                )
                ",
            )
            .bind(deleted.product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(deleted)
    }

    /// Rewrite gallery order. `ids` must list every image of the product once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if `ids` is not exactly the
    /// product's image set.
    pub async fn reorder(
        &self,
        product_id: ProductId,
        ids: &[ProductImageId],
    ) -> Result<Vec<ProductImage>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_product(&mut tx, product_id).await?;

        let mut existing = sqlx::query_scalar::<_, ProductImageId>(
            "SELECT id FROM product_images WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut requested = ids.to_vec();
        existing.sort_unstable();
        requested.sort_unstable();
        if existing != requested {
            return Err(RepositoryError::Conflict(
                "image order must list every image of the product exactly once".to_string(),
            ));
        }

        let positions: Vec<i32> = (0..).take(ids.len()).collect();
        sqlx::query(
            r"
            UPDATE product_images AS i
            SET sort_order = o.position
            FROM UNNEST($1::uuid[], $2::int4[]) AS o(id, position)
            WHERE i.id = o.id
            ",
        )
        .bind(ids)
        .bind(&positions)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.list_for_product(product_id).await
    }
}

async fn lock_product(conn: &mut PgConnection, product_id: ProductId) -> Result<(), RepositoryError> {
    sqlx::query_scalar::<_, ProductId>("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(conn)
        .await?
        .map(|_| ())
        .ok_or(RepositoryError::NotFound)
}

async fn clear_primary(conn: &mut PgConnection, product_id: ProductId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE product_images SET is_primary = FALSE WHERE product_id = $1 AND is_primary")
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(())
}
