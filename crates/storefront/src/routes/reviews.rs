//! Product review routes.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::instrument;

use kedai_core::{PageRequest, Paginated, ReviewId};

use crate::db::{CatalogRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{RatingSummary, Review};
use crate::services::{ReviewInput, ReviewService};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ReviewPage {
    pub summary: RatingSummary,
    #[serde(flatten)]
    pub reviews: Paginated<Review>,
}

/// `GET /api/products/{slug}/reviews`
pub async fn list(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(page): Query<PageRequest>,
) -> Result<Json<ReviewPage>> {
    let catalog = CatalogRepository::new(state.pool());
    let product_id = catalog
        .product_id_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let summary = catalog.rating_summary(product_id).await?;
    let reviews = ReviewRepository::new(state.pool())
        .list_approved(product_id, page.clamped())
        .await?;

    Ok(Json(ReviewPage { summary, reviews }))
}

/// `POST /api/products/{slug}/reviews`
#[instrument(skip(state, user, body), fields(profile_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Json(body): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>)> {
    let settings = state.cache().settings(state.pool()).await?;
    let review = ReviewService::new(state.pool())
        .submit(user.id, &slug, body, &settings)
        .await?;

    tracing::info!(review_id = %review.id, status = ?review.status, "Review submitted");
    Ok((StatusCode::CREATED, Json(review)))
}

/// `DELETE /api/reviews/{id}`
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode> {
    ReviewService::new(state.pool()).delete_own(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
