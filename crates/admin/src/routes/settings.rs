//! Store settings (admin only).
//!
//! The storefront reads the same `general` row, so a saved change applies to
//! new checkouts without a restart.

use axum::{Json, extract::State};
use tracing::instrument;

use kedai_core::StoreSettings;

use crate::db::SettingsRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// `GET /api/settings`
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<StoreSettings>> {
    Ok(Json(SettingsRepository::new(state.pool()).get().await?))
}

/// `PUT /api/settings`
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<StoreSettings>,
) -> Result<Json<StoreSettings>> {
    let settings = body
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    SettingsRepository::new(state.pool())
        .put(&settings, admin.profile_id)
        .await?;
    tracing::info!(by = %admin.profile_id, "Store settings updated");

    Ok(Json(settings))
}
