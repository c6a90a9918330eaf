//! Identity resolution and role extractors.
//!
//! The session only proves *who* a staff member is. Their role is looked up
//! on every request through the role cache, so demotions apply immediately.
//!
//! Downstream layers may read the trusted `x-user-id` / `x-user-role`
//! headers. Inbound copies of those headers are always removed first, so a
//! client can never assert an identity.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, request::Parts},
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

use kedai_core::{Email, ProfileId, Role};

use crate::error::AppError;
use crate::models::{CurrentStaff, session_keys};
use crate::state::AppState;

/// Trusted header carrying the resolved profile ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Trusted header carrying the resolved role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The caller, as resolved by [`identity_middleware`].
#[derive(Debug, Clone)]
pub struct Identity {
    pub profile_id: ProfileId,
    pub email: Email,
    pub role: Role,
}

/// Remove client-supplied identity headers.
pub fn strip_identity_headers(headers: &mut HeaderMap) {
    headers.remove(USER_ID_HEADER);
    headers.remove(USER_ROLE_HEADER);
}

/// Write the trusted identity headers.
pub fn insert_identity_headers(headers: &mut HeaderMap, identity: &Identity) {
    if let Ok(id) = HeaderValue::from_str(&identity.profile_id.to_string()) {
        headers.insert(USER_ID_HEADER, id);
    }
    headers.insert(
        USER_ROLE_HEADER,
        HeaderValue::from_static(identity.role.as_str()),
    );
}

/// Resolve the session's staff member and their current role.
///
/// # Errors
///
/// Returns `AppError::Database` if the role cannot be read at all.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    strip_identity_headers(request.headers_mut());

    let staff = match request.extensions().get::<Session>() {
        Some(session) => session
            .get::<CurrentStaff>(session_keys::CURRENT_STAFF)
            .await
            .ok()
            .flatten(),
        None => None,
    };

    if let Some(staff) = staff
        && let Some(role) = state.roles().role_of(state.pool(), staff.id).await?
    {
        let identity = Identity {
            profile_id: staff.id,
            email: staff.email,
            role,
        };
        insert_identity_headers(request.headers_mut(), &identity);
        request.extensions_mut().insert(identity);
    }

    Ok(next.run(request).await)
}

fn identity(parts: &Parts) -> Result<Identity, AppError> {
    parts
        .extensions
        .get::<Identity>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("Please log in to continue".to_string()))
}

/// Extractor that requires a staff member or admin.
pub struct RequireStaff(pub Identity);

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity(parts)?;
        if !identity.role.is_staff() {
            return Err(AppError::Forbidden("Staff access required".to_string()));
        }
        Ok(Self(identity))
    }
}

/// Extractor that requires an admin.
pub struct RequireAdmin(pub Identity);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity(parts)?;
        if !identity.role.can_manage_users() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(identity))
    }
}

/// Log a staff member in: rotate the session ID, then store the identity.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_staff(
    session: &Session,
    staff: &CurrentStaff,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_STAFF, staff).await
}

/// Log out: drop all session data and delete the session record.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn clear_current_staff(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
    };
    use tower::ServiceExt;

    fn identity_with(role: Role) -> Identity {
        Identity {
            profile_id: ProfileId::generate(),
            email: Email::parse("staff@kedai.test").unwrap(),
            role,
        }
    }

    async fn staff_only(RequireStaff(who): RequireStaff) -> String {
        who.role.to_string()
    }

    async fn admin_only(RequireAdmin(who): RequireAdmin) -> String {
        who.role.to_string()
    }

    fn app(identity: Option<Identity>) -> Router {
        Router::new()
            .route("/staff", get(staff_only))
            .route("/admin", get(admin_only))
            .layer(middleware::from_fn(move |mut req: Request, next: Next| {
                let identity = identity.clone();
                async move {
                    if let Some(identity) = identity {
                        req.extensions_mut().insert(identity);
                    }
                    next.run(req).await
                }
            }))
    }

    async fn status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_anonymous_is_unauthorized() {
        assert_eq!(status(app(None), "/staff").await, StatusCode::UNAUTHORIZED);
        assert_eq!(status(app(None), "/admin").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_customer_is_forbidden() {
        let customer = Some(identity_with(Role::Customer));
        assert_eq!(status(app(customer), "/staff").await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_staff_cannot_reach_admin_routes() {
        let staff = Some(identity_with(Role::Staff));
        assert_eq!(status(app(staff.clone()), "/staff").await, StatusCode::OK);
        assert_eq!(status(app(staff), "/admin").await, StatusCode::FORBIDDEN);

        let admin = Some(identity_with(Role::Admin));
        assert_eq!(status(app(admin), "/admin").await, StatusCode::OK);
    }

    #[test]
    fn test_inbound_identity_headers_are_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("forged"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("admin"));

        strip_identity_headers(&mut headers);
        assert!(headers.get(USER_ID_HEADER).is_none());
        assert!(headers.get(USER_ROLE_HEADER).is_none());

        let staff = identity_with(Role::Staff);
        insert_identity_headers(&mut headers, &staff);
        assert_eq!(headers[USER_ROLE_HEADER], "staff");
        assert_eq!(
            headers[USER_ID_HEADER].to_str().unwrap(),
            staff.profile_id.to_string()
        );
    }
}
