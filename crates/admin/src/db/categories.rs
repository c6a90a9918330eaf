//! Category management.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use kedai_core::CategoryId;

use super::RepositoryError;
use crate::models::AdminCategory;

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: Option<String>,
    parent_id: Option<CategoryId>,
    sort_order: i32,
    product_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for AdminCategory {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            parent_id: row.parent_id,
            sort_order: row.sort_order,
            product_count: row.product_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fully resolved category fields, used for both insert and update.
#[derive(Debug, Clone)]
pub struct CategoryFields {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub sort_order: i32,
}

const CATEGORY_SELECT: &str = r"
    SELECT c.id, c.name, c.slug, c.description, c.parent_id, c.sort_order,
           c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM products p WHERE p.category_id = c.id) AS product_count
    FROM categories c
";

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories ordered for navigation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<AdminCategory>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "{CATEGORY_SELECT} ORDER BY c.sort_order, c.name"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<AdminCategory>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!("{CATEGORY_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a duplicate slug or unknown parent.
    pub async fn create(&self, fields: &CategoryFields) -> Result<AdminCategory, RepositoryError> {
        let id = sqlx::query_scalar::<_, CategoryId>(
            r"
            INSERT INTO categories (name, slug, description, parent_id, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(&fields.name)
        .bind(&fields.slug)
        .bind(fields.description.as_deref())
        .bind(fields.parent_id)
        .bind(fields.sort_order)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category slug or parent is invalid"))?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Overwrite a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` on a duplicate slug or unknown parent.
    pub async fn update(
        &self,
        id: CategoryId,
        fields: &CategoryFields,
    ) -> Result<AdminCategory, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE categories
            SET name = $2, slug = $3, description = $4, parent_id = $5, sort_order = $6,
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.slug)
        .bind(fields.description.as_deref())
        .bind(fields.parent_id)
        .bind(fields.sort_order)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category slug or parent is invalid"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while products reference it.
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                RepositoryError::from_constraint(e, "category still has products")
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Whether making `parent_id` the parent of `id` would create a cycle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn would_cycle(
        &self,
        id: CategoryId,
        parent_id: CategoryId,
    ) -> Result<bool, RepositoryError> {
        let cycles = sqlx::query_scalar::<_, bool>(
            r"
            WITH RECURSIVE ancestors AS (
                SELECT id, parent_id FROM categories WHERE id = $2
                UNION
                SELECT c.id, c.parent_id
                FROM categories c
                JOIN ancestors a ON c.id = a.parent_id
            )
            SELECT EXISTS (SELECT 1 FROM ancestors WHERE id = $1)
            ",
        )
        .bind(id)
        .bind(parent_id)
        .fetch_one(self.pool)
        .await?;

        Ok(cycles)
    }
}
