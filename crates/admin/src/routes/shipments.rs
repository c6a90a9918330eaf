//! EasyParcel shipment booking.
//!
//! Booking is two remote calls (submit, then pay). A failed payment leaves
//! the shipment `submitted` with its error recorded; staff retry through
//! `POST /api/shipments/{id}/pay` instead of booking again.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::instrument;

use kedai_core::{OrderId, ShipmentId};

use crate::easyparcel::Rate;
use crate::error::{AppError, Result};
use crate::middleware::RequireStaff;
use crate::models::Shipment;
use crate::services::shipping::BookShipment;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RateList {
    pub rates: Vec<Rate>,
}

/// `POST /api/orders/{id}/shipment/rates`
#[instrument(skip(state))]
pub async fn rates(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<Json<RateList>> {
    let rates = state.shipping().rates(id).await?;
    Ok(Json(RateList { rates }))
}

/// `POST /api/orders/{id}/shipment`
#[instrument(skip(state, body))]
pub async fn book(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<OrderId>,
    Json(body): Json<BookShipment>,
) -> Result<(StatusCode, Json<Shipment>)> {
    if body.service_id.trim().is_empty() {
        return Err(AppError::BadRequest("service_id is required".to_string()));
    }

    let shipment = state
        .shipping()
        .book(id, &body, staff.profile_id)
        .await?;
    tracing::info!(
        order_id = %id,
        shipment_id = %shipment.id,
        by = %staff.profile_id,
        "Shipment booked"
    );
    Ok((StatusCode::CREATED, Json(shipment)))
}

/// `GET /api/orders/{id}/shipment`
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<OrderId>,
) -> Result<Json<Shipment>> {
    state
        .shipping()
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No shipment for this order".to_string()))
}

/// `POST /api/shipments/{id}/pay`
#[instrument(skip(state))]
pub async fn retry_payment(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ShipmentId>,
) -> Result<Json<Shipment>> {
    let shipment = state
        .shipping()
        .retry_payment(id, staff.profile_id)
        .await?;
    tracing::info!(shipment_id = %id, by = %staff.profile_id, "Shipment payment retried");
    Ok(Json(shipment))
}
