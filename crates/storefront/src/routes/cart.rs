//! Cart routes. All require login.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use kedai_core::{CartItemId, VariantId};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::CartView;
use crate::services::CartService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub variant_id: VariantId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct Cleared {
    pub removed: u64,
}

/// `GET /api/cart`
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    let settings = state.cache().settings(state.pool()).await?;
    let view = CartService::new(state.pool()).view(user.id, &settings).await?;
    Ok(Json(view))
}

/// `POST /api/cart/items`
#[instrument(skip(state, user), fields(profile_id = %user.id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartView>)> {
    let cart = CartService::new(state.pool());
    cart.add(user.id, body.variant_id, body.quantity).await?;

    let settings = state.cache().settings(state.pool()).await?;
    Ok((StatusCode::CREATED, Json(cart.view(user.id, &settings).await?)))
}

/// `PATCH /api/cart/items/{id}`
#[instrument(skip(state, user), fields(profile_id = %user.id))]
pub async fn update_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<CartItemId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool());
    cart.update(user.id, id, body.quantity).await?;

    let settings = state.cache().settings(state.pool()).await?;
    Ok(Json(cart.view(user.id, &settings).await?))
}

/// `DELETE /api/cart/items/{id}`
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<CartItemId>,
) -> Result<StatusCode> {
    CartService::new(state.pool()).remove(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/cart`
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Cleared>> {
    let removed = CartService::new(state.pool()).clear(user.id).await?;
    Ok(Json(Cleared { removed }))
}
