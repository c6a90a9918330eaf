//! Customer review storage.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use kedai_core::{PageRequest, Paginated, ProductId, ProfileId, Rating, ReviewId, ReviewStatus};

use super::RepositoryError;
use crate::models::Review;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    rating: i16,
    title: Option<String>,
    body: String,
    reviewer_name: Option<String>,
    is_verified_purchase: bool,
    status: ReviewStatus,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            rating: row.rating,
            title: row.title,
            body: row.body,
            reviewer_name: row
                .reviewer_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Customer".to_owned()),
            is_verified_purchase: row.is_verified_purchase,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.product_id, r.rating, r.title, r.body,
           pr.full_name AS reviewer_name,
           r.is_verified_purchase, r.status, r.created_at
    FROM product_reviews r
    LEFT JOIN profiles pr ON pr.id = r.profile_id
";

/// A review to insert.
#[derive(Debug)]
pub struct NewReview<'a> {
    pub product_id: ProductId,
    pub profile_id: ProfileId,
    pub rating: Rating,
    pub title: Option<&'a str>,
    pub body: &'a str,
    pub is_verified_purchase: bool,
    pub status: ReviewStatus,
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Approved reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_approved(
        &self,
        product_id: ProductId,
        page: PageRequest,
    ) -> Result<Paginated<Review>, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM product_reviews WHERE product_id = $1 AND status = 'approved'",
        )
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "{REVIEW_SELECT} WHERE r.product_id = $1 AND r.status = 'approved'
             ORDER BY r.created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(product_id)
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

    /// Whether the customer has a paid order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_purchased(
        &self,
        profile_id: ProfileId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let purchased: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM orders o
                JOIN order_items oi ON oi.order_id = o.id
                WHERE o.profile_id = $1
                  AND oi.product_id = $2
                  AND o.status IN ('paid', 'processing', 'shipped', 'delivered')
            )
            ",
        )
        .bind(profile_id)
        .bind(product_id)
        .fetch_one(self.pool)
        .await?;

        Ok(purchased)
    }

    /// Insert a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the customer already reviewed the product.
    pub async fn create(&self, review: &NewReview<'_>) -> Result<Review, RepositoryError> {
        let id = sqlx::query_scalar::<_, ReviewId>(
            r"
            INSERT INTO product_reviews
                (product_id, profile_id, rating, title, body, status, is_verified_purchase)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(review.product_id)
        .bind(review.profile_id)
        .bind(i16::from(review.rating))
        .bind(review.title)
        .bind(review.body)
        .bind(review.status)
        .bind(review.is_verified_purchase)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "you have already reviewed this product"))?;

        let row = sqlx::query_as::<_, ReviewRow>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_one(self.pool)
            .await?;

        Ok(row.into())
    }

    /// Delete the customer's own review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review is not the customer's.
    pub async fn delete_own(
        &self,
        review_id: ReviewId,
        profile_id: ProfileId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM product_reviews WHERE id = $1 AND profile_id = $2")
                .bind(review_id)
                .bind(profile_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
