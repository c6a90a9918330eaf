//! Review moderation.

use sqlx::PgPool;

use kedai_core::{NotificationKind, ProfileId, ReviewId, ReviewStatus};

use crate::db::notifications::{self, NewNotification};
use crate::db::reviews::{self, ModeratedReview};
use crate::db::RepositoryError;

/// Approve or reject a review and, on approval, notify the reviewer.
///
/// Both writes share one transaction.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the review does not exist.
#[tracing::instrument(skip(pool))]
pub async fn moderate(
    pool: &PgPool,
    id: ReviewId,
    decision: ReviewStatus,
    moderator: ProfileId,
) -> Result<ModeratedReview, RepositoryError> {
    let mut tx = pool.begin().await?;

    let review = reviews::moderate(&mut tx, id, decision, moderator).await?;

    if review.status == ReviewStatus::Approved {
        notifications::insert(
            &mut tx,
            review.profile_id,
            &NewNotification {
                kind: NotificationKind::Review,
                title: "Your review is live".to_owned(),
                body: format!("Thanks! Your review of {} has been published.", review.product_name),
                link: Some(format!("/products/{}", review.product_slug)),
                order_id: None,
            },
        )
        .await?;
    }

    tx.commit().await?;
    tracing::info!(review_id = %id, status = ?review.status, "Review moderated");
    Ok(review)
}
