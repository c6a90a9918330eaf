//! Review moderation queue.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use kedai_core::{PageRequest, Paginated, ProductId, ProfileId, ReviewId, ReviewStatus};

use super::RepositoryError;
use crate::models::AdminReview;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    product_name: String,
    profile_id: ProfileId,
    reviewer_email: String,
    rating: i16,
    title: Option<String>,
    body: String,
    status: ReviewStatus,
    is_verified_purchase: bool,
    moderated_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for AdminReview {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            profile_id: row.profile_id,
            reviewer_email: row.reviewer_email,
            rating: row.rating,
            title: row.title,
            body: row.body,
            status: row.status,
            is_verified_purchase: row.is_verified_purchase,
            moderated_at: row.moderated_at,
            created_at: row.created_at,
        }
    }
}

/// A review after a moderation decision.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct ModeratedReview {
    pub id: ReviewId,
    pub profile_id: ProfileId,
    pub product_name: String,
    pub product_slug: String,
    pub status: ReviewStatus,
}

/// Repository for review moderation.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews in any state, oldest pending first when filtering the queue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<ReviewStatus>,
        page: PageRequest,
    ) -> Result<Paginated<AdminReview>, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM product_reviews WHERE ($1::review_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT r.id, r.product_id, p.name AS product_name, r.profile_id,
                   pr.email AS reviewer_email, r.rating, r.title, r.body, r.status,
                   r.is_verified_purchase, r.moderated_at, r.created_at
            FROM product_reviews r
            JOIN products p ON p.id = r.product_id
            JOIN profiles pr ON pr.id = r.profile_id
            WHERE ($1::review_status IS NULL OR r.status = $1)
            ORDER BY CASE WHEN r.status = 'pending' THEN r.created_at END ASC NULLS LAST,
                     r.created_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(status)
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

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM product_reviews WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Approve or reject a review.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the review does not exist.
pub async fn moderate(
    conn: &mut PgConnection,
    id: ReviewId,
    status: ReviewStatus,
    moderator: ProfileId,
) -> Result<ModeratedReview, RepositoryError> {
    sqlx::query_as::<_, ModeratedReview>(
        r"
        UPDATE product_reviews r
        SET status = $2, moderated_by = $3, moderated_at = now(), updated_at = now()
        FROM products p
        WHERE r.id = $1 AND p.id = r.product_id
        RETURNING r.id, r.profile_id, p.name AS product_name, p.slug AS product_slug, r.status
        ",
    )
    .bind(id)
    .bind(status)
    .bind(moderator)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}
