//! Customer authentication routes.
//!
//! Session-based: login stores a [`CurrentUser`] in the session after
//! rotating the session ID; logout flushes the session.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::ProfileRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, Profile};
use crate::services::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/register`
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Profile>)> {
    let profile = AuthService::new(state.pool())
        .register(&body.email, &body.password, body.full_name.as_deref())
        .await?;

    log_in(&session, &profile).await?;
    tracing::info!(profile_id = %profile.id, "Customer registered");

    Ok((StatusCode::CREATED, Json(profile)))
}

/// `POST /api/auth/login`
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Profile>> {
    let profile = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await
        .inspect_err(|_| tracing::info!("Failed login attempt"))?;

    log_in(&session, &profile).await?;
    tracing::info!(profile_id = %profile.id, "Customer logged in");

    Ok(Json(profile))
}

/// `POST /api/auth/logout`
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session flush failed: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`
pub async fn me(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Result<Json<Profile>> {
    ProfileRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized("Please log in to continue".to_string()))
}

async fn log_in(session: &Session, profile: &Profile) -> Result<()> {
    let user = CurrentUser {
        id: profile.id,
        email: profile.email.clone(),
    };
    set_current_user(session, &user)
        .await
        .map_err(|e| AppError::Internal(format!("session write failed: {e}")))?;
    set_sentry_user(&profile.id, Some(profile.email.as_str()));
    Ok(())
}
