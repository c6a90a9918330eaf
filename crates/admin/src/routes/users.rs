//! User and role management (admin only).

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use kedai_core::{PageRequest, Paginated, ProfileId, Role};

use crate::db::ProfileRepository;
use crate::error::{AppError, Result};
use crate::middleware::{Identity, RequireAdmin};
use crate::models::UserSummary;
use crate::state::AppState;

/// Query string of `GET /api/users`.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
    /// Email or name fragment.
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

/// `GET /api/users`
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<UserQuery>,
) -> Result<Json<Paginated<UserSummary>>> {
    let page = PageRequest::new(query.page.unwrap_or(1), query.per_page.unwrap_or(20));
    let q = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let users = ProfileRepository::new(state.pool())
        .list(query.role, q, page)
        .await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// An admin may not take away their own admin role.
fn check_role_change(actor: &Identity, target: ProfileId, role: Role) -> Result<()> {
    if actor.profile_id == target && role != Role::Admin {
        return Err(AppError::Validation(
            "You cannot remove your own admin role".to_string(),
        ));
    }
    Ok(())
}

/// `PUT /api/users/{id}/role`
#[instrument(skip(state, admin))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProfileId>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<UserSummary>> {
    check_role_change(&admin, id, body.role)?;

    let profiles = ProfileRepository::new(state.pool());
    profiles.set_role(id, body.role).await?;
    state.roles().invalidate(id).await;

    tracing::info!(
        profile_id = %id,
        role = %body.role,
        by = %admin.profile_id,
        "Role changed"
    );

    profiles
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kedai_core::Email;

    fn admin() -> Identity {
        Identity {
            profile_id: ProfileId::generate(),
            email: Email::parse("boss@kedai.test").unwrap(),
            role: Role::Admin,
        }
    }

    #[test]
    fn test_admin_cannot_demote_self() {
        let me = admin();
        let err = check_role_change(&me, me.profile_id, Role::Staff).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(check_role_change(&me, me.profile_id, Role::Customer).is_err());
    }

    #[test]
    fn test_admin_may_keep_own_role() {
        let me = admin();
        assert!(check_role_change(&me, me.profile_id, Role::Admin).is_ok());
    }

    #[test]
    fn test_admin_may_change_others() {
        let me = admin();
        assert!(check_role_change(&me, ProfileId::generate(), Role::Customer).is_ok());
    }
}
