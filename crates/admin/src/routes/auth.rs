//! Staff authentication routes.
//!
//! Login stores only the profile ID and email in the session. The role is
//! never cached there; `me` reports what the identity middleware resolved
//! for this request.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use kedai_core::{Email, ProfileId, Role};

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireStaff, clear_current_staff, set_current_staff};
use crate::services::AdminAuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The signed-in staff member.
#[derive(Debug, Serialize)]
pub struct Me {
    pub id: ProfileId,
    pub email: Email,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub role: Role,
}

/// `POST /api/auth/login`
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Me>> {
    let login = AdminAuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await
        .inspect_err(|e| tracing::info!(error = %e, "Failed staff login attempt"))?;

    set_current_staff(&session, &login.staff)
        .await
        .map_err(|e| AppError::Internal(format!("session write failed: {e}")))?;
    // A fresh login should never see a role cached before a promotion.
    state.roles().invalidate(login.staff.id).await;
    set_sentry_user(&login.staff.id, Some(login.staff.email.as_str()));

    tracing::info!(profile_id = %login.staff.id, role = %login.role, "Staff logged in");

    Ok(Json(Me {
        id: login.staff.id,
        email: login.staff.email,
        full_name: login.full_name,
        role: login.role,
    }))
}

/// `POST /api/auth/logout`
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_staff(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session flush failed: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`
pub async fn me(RequireStaff(identity): RequireStaff) -> Json<Me> {
    Json(Me {
        id: identity.profile_id,
        email: identity.email,
        full_name: None,
        role: identity.role,
    })
}
