//! Order listing, detail and status changes.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use kedai_core::{OrderId, OrderStatus, PageRequest, Paginated};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireStaff;
use crate::models::{AdminOrderDetail, AdminOrderSummary};
use crate::services::lifecycle::{StatusChangeOutcome, StatusChangeRequest};
use crate::state::AppState;

/// Longest note accepted on a status change.
const MAX_NOTE_CHARS: usize = 500;

/// Query string of `GET /api/orders`.
#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    /// Order number or contact email fragment.
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

/// `GET /api/orders`
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Paginated<AdminOrderSummary>>> {
    let page = PageRequest::new(query.page.unwrap_or(1), query.per_page.unwrap_or(20));
    let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let orders = OrderRepository::new(state.pool())
        .list(query.status, q, page)
        .await?;
    Ok(Json(orders))
}

/// `GET /api/orders/{id}`
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<Json<AdminOrderDetail>> {
    OrderRepository::new(state.pool())
        .detail(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeBody {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
}

/// `POST /api/orders/{id}/status`
#[instrument(skip(state, body))]
pub async fn change_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusChangeBody>,
) -> Result<Json<StatusChangeOutcome>> {
    let note = body
        .note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    if note.is_some_and(|n| n.chars().count() > MAX_NOTE_CHARS) {
        return Err(AppError::BadRequest(format!(
            "note cannot exceed {MAX_NOTE_CHARS} characters"
        )));
    }

    let outcome = state
        .lifecycle()
        .transition(&StatusChangeRequest {
            order_id: id,
            next: body.status,
            note,
            actor: Some(staff.profile_id),
        })
        .await?;

    Ok(Json(outcome))
}
