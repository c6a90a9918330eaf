//! Reviews in the moderation queue.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kedai_core::{ProductId, ProfileId, ReviewId, ReviewStatus};

#[derive(Debug, Clone, Serialize)]
pub struct AdminReview {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub product_name: String,
    pub profile_id: ProfileId,
    pub reviewer_email: String,
    pub rating: i16,
    pub title: Option<String>,
    pub body: String,
    pub status: ReviewStatus,
    pub is_verified_purchase: bool,
    pub moderated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
