//! Stripe webhook endpoint.
//!
//! The body is taken as raw bytes because the signature covers the exact
//! payload. Verification failures are 400; database failures are 500 so
//! Stripe retries; everything else, including events for unknown orders, is
//! acknowledged with 200.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::PaymentService;
use crate::state::AppState;
use crate::stripe::Event;
use crate::stripe::webhook::{now_unix, verify_signature};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct Ack {
    pub received: bool,
}

/// `POST /api/webhooks/stripe`
#[instrument(skip_all)]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Ack>)> {
    let event = verify_and_parse(&state, &headers, &body)?;

    let settings = state.cache().settings(state.pool()).await?;
    PaymentService::new(state.pool(), &settings)
        .handle(&event)
        .await?;

    Ok((StatusCode::OK, Json(Ack { received: true })))
}

fn verify_and_parse(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Event> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    let stripe = &state.config().stripe;
    verify_signature(
        &stripe.webhook_secret,
        signature,
        body,
        stripe.webhook_tolerance_secs,
        now_unix(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Rejected Stripe webhook");
        AppError::BadRequest("Invalid signature".to_string())
    })?;

    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!(error = %e, "Unparseable Stripe event");
        AppError::BadRequest("Invalid event payload".to_string())
    })
}
