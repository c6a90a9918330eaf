//! Review moderation routes.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use kedai_core::{PageRequest, Paginated, ReviewId, ReviewStatus};

use crate::db::ReviewRepository;
use crate::db::reviews::ModeratedReview;
use crate::error::Result;
use crate::middleware::RequireStaff;
use crate::models::AdminReview;
use crate::services::reviews::moderate;
use crate::state::AppState;

/// Query string of `GET /api/reviews`.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub status: Option<ReviewStatus>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

/// `GET /api/reviews`
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<ReviewQuery>,
) -> Result<Json<Paginated<AdminReview>>> {
    let page = PageRequest::new(query.page.unwrap_or(1), query.per_page.unwrap_or(20));
    let reviews = ReviewRepository::new(state.pool())
        .list(query.status, page)
        .await?;
    Ok(Json(reviews))
}

/// `POST /api/reviews/{id}/approve`
#[instrument(skip(state))]
pub async fn approve(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ReviewId>,
) -> Result<Json<ModeratedReview>> {
    let review = moderate(state.pool(), id, ReviewStatus::Approved, staff.profile_id).await?;
    Ok(Json(review))
}

/// `POST /api/reviews/{id}/reject`
#[instrument(skip(state))]
pub async fn reject(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ReviewId>,
) -> Result<Json<ModeratedReview>> {
    let review = moderate(state.pool(), id, ReviewStatus::Rejected, staff.profile_id).await?;
    Ok(Json(review))
}

/// `DELETE /api/reviews/{id}`
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode> {
    ReviewRepository::new(state.pool()).delete(id).await?;
    tracing::info!(review_id = %id, by = %staff.profile_id, "Review deleted");
    Ok(StatusCode::NO_CONTENT)
}
