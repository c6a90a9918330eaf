//! Review submission rules.

use sqlx::PgPool;
use thiserror::Error;

use kedai_core::{ProfileId, Rating, RatingError, ReviewId, ReviewStatus, StoreSettings};

use crate::db::reviews::NewReview;
use crate::db::{CatalogRepository, RepositoryError, ReviewRepository};
use crate::models::Review;

pub const MIN_BODY_LENGTH: usize = 10;
pub const MAX_BODY_LENGTH: usize = 2000;
pub const MAX_TITLE_LENGTH: usize = 120;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Rating(#[from] RatingError),

    #[error("review must be between {MIN_BODY_LENGTH} and {MAX_BODY_LENGTH} characters")]
    BodyLength,

    #[error("title must be at most {MAX_TITLE_LENGTH} characters")]
    TitleTooLong,

    #[error("product not found")]
    ProductNotFound,

    #[error("review not found")]
    ReviewNotFound,

    #[error("you have already reviewed this product")]
    AlreadyReviewed,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A review as submitted by a customer.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ReviewInput {
    pub rating: i64,
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
}

/// Validated review fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidReview {
    pub rating: Rating,
    pub title: Option<String>,
    pub body: String,
}

impl ReviewInput {
    /// Trim and check the submitted fields.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError` for out-of-range ratings or bad lengths.
    pub fn validate(self) -> Result<ValidReview, ReviewError> {
        let rating = Rating::new(self.rating)?;

        let body = self.body.trim().to_owned();
        let body_len = body.chars().count();
        if !(MIN_BODY_LENGTH..=MAX_BODY_LENGTH).contains(&body_len) {
            return Err(ReviewError::BodyLength);
        }

        let title = self
            .title
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());
        if title
            .as_ref()
            .is_some_and(|t| t.chars().count() > MAX_TITLE_LENGTH)
        {
            return Err(ReviewError::TitleTooLong);
        }

        Ok(ValidReview {
            rating,
            title,
            body,
        })
    }
}

/// Review service.
pub struct ReviewService<'a> {
    reviews: ReviewRepository<'a>,
    catalog: CatalogRepository<'a>,
}

impl<'a> ReviewService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            reviews: ReviewRepository::new(pool),
            catalog: CatalogRepository::new(pool),
        }
    }

    /// Submit a review for the product at `slug`.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError` for invalid input, unknown products, or a second
    /// review of the same product.
    pub async fn submit(
        &self,
        profile_id: ProfileId,
        slug: &str,
        input: ReviewInput,
        settings: &StoreSettings,
    ) -> Result<Review, ReviewError> {
        let review = input.validate()?;

        let product_id = self
            .catalog
            .product_id_by_slug(slug)
            .await?
            .ok_or(ReviewError::ProductNotFound)?;

        let verified = self.reviews.has_purchased(profile_id, product_id).await?;

        self.reviews
            .create(&NewReview {
                product_id,
                profile_id,
                rating: review.rating,
                title: review.title.as_deref(),
                body: &review.body,
                is_verified_purchase: verified,
                status: initial_status(settings),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ReviewError::AlreadyReviewed,
                other => ReviewError::Repository(other),
            })
    }

    /// Delete one of the customer's own reviews.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::ReviewNotFound` if the review is not theirs.
    pub async fn delete_own(&self, profile_id: ProfileId, id: ReviewId) -> Result<(), ReviewError> {
        self.reviews
            .delete_own(id, profile_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ReviewError::ReviewNotFound,
                other => ReviewError::Repository(other),
            })
    }
}

/// Status a new review starts in.
#[must_use]
pub const fn initial_status(settings: &StoreSettings) -> ReviewStatus {
    if settings.reviews_require_approval {
        ReviewStatus::Pending
    } else {
        ReviewStatus::Approved
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(rating: i64, title: Option<&str>, body: &str) -> ReviewInput {
        ReviewInput {
            rating,
            title: title.map(str::to_owned),
            body: body.to_owned(),
        }
    }

    #[test]
    fn test_valid_review_is_trimmed() {
        let review = input(5, Some("  Sedap  "), "  Very fragrant, will buy again.  ")
            .validate()
            .unwrap();
        assert_eq!(review.rating.get(), 5);
        assert_eq!(review.title.as_deref(), Some("Sedap"));
        assert_eq!(review.body, "Very fragrant, will buy again.");
    }

    #[test]
    fn test_blank_title_dropped() {
        let review = input(3, Some("   "), "Decent for the price.").validate().unwrap();
        assert_eq!(review.title, None);
    }

    #[test]
    fn test_rating_bounds() {
        assert!(matches!(
            input(0, None, "Not good at all.").validate(),
            Err(ReviewError::Rating(_))
        ));
        assert!(matches!(
            input(6, None, "Far too good to be true.").validate(),
            Err(ReviewError::Rating(_))
        ));
    }

    #[test]
    fn test_body_and_title_lengths() {
        assert!(matches!(
            input(4, None, "short").validate(),
            Err(ReviewError::BodyLength)
        ));
        assert!(matches!(
            input(4, None, &"a".repeat(MAX_BODY_LENGTH + 1)).validate(),
            Err(ReviewError::BodyLength)
        ));
        assert!(input(4, None, &"a".repeat(MAX_BODY_LENGTH)).validate().is_ok());
        assert!(matches!(
            input(4, Some(&"t".repeat(MAX_TITLE_LENGTH + 1)), "Good enough for me.").validate(),
            Err(ReviewError::TitleTooLong)
        ));
    }

    #[test]
    fn test_initial_status_follows_settings() {
        let mut settings = StoreSettings::default();
        assert_eq!(initial_status(&settings), ReviewStatus::Pending);
        settings.reviews_require_approval = false;
        assert_eq!(initial_status(&settings), ReviewStatus::Approved);
    }
}
