//! Checkout routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use kedai_core::{OrderId, ShippingAddress};

use crate::db::OrderRepository;
use crate::db::orders::OrderStatusView;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::services::{CheckoutService, CheckoutStarted};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `POST /api/checkout`
#[instrument(skip_all, fields(profile_id = %user.id))]
pub async fn start(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutStarted>)> {
    let settings = state.cache().settings(state.pool()).await?;

    let started = CheckoutService::new(state.pool(), state.stripe(), &state.config().base_url)
        .start(&user, body.shipping_address, body.notes, &settings)
        .await?;

    add_breadcrumb(
        "checkout",
        "Checkout session created",
        Some(&[("order_number", started.order_number.as_str())]),
    );

    Ok((StatusCode::CREATED, Json(started)))
}

/// `GET /api/checkout/orders/{order_id}`
pub async fn order_status(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderStatusView>> {
    OrderRepository::new(state.pool())
        .status_for_profile(order_id, user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}
