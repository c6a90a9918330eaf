//! Account routes. All require login.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use kedai_core::{OrderId, PageRequest, Paginated};

use crate::db::{OrderRepository, ProfileRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{OrderDetail, OrderSummary, Profile};
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 120;
const MAX_PHONE_LENGTH: usize = 32;

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl UpdateAccountRequest {
    /// Trimmed fields; blank values are treated as absent.
    fn validated(&self) -> std::result::Result<(Option<&str>, Option<&str>), AppError> {
        let full_name = self.full_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let phone = self.phone.as_deref().map(str::trim).filter(|s| !s.is_empty());

        if full_name.is_some_and(|n| n.chars().count() > MAX_NAME_LENGTH) {
            return Err(AppError::Validation(format!(
                "name must be at most {MAX_NAME_LENGTH} characters"
            )));
        }
        if let Some(phone) = phone
            && (phone.len() > MAX_PHONE_LENGTH
                || !phone
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')')))
        {
            return Err(AppError::Validation("invalid phone number".to_string()));
        }
        Ok((full_name, phone))
    }
}

/// `GET /api/account`
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Profile>> {
    ProfileRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
}

/// `PATCH /api/account`
#[instrument(skip(state, user, body), fields(profile_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<UpdateAccountRequest>,
) -> Result<Json<Profile>> {
    let (full_name, phone) = body.validated()?;
    let profile = ProfileRepository::new(state.pool())
        .update_contact(user.id, full_name, phone)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Account not found".to_string()),
            other => other.into(),
        })?;
    Ok(Json(profile))
}

/// `GET /api/account/orders`
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(page): Query<PageRequest>,
) -> Result<Json<Paginated<OrderSummary>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_profile(user.id, page.clamped())
        .await?;
    Ok(Json(orders))
}

/// `GET /api/account/orders/{id}`
pub async fn order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    OrderRepository::new(state.pool())
        .detail_for_profile(id, user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(full_name: Option<&str>, phone: Option<&str>) -> UpdateAccountRequest {
        UpdateAccountRequest {
            full_name: full_name.map(str::to_owned),
            phone: phone.map(str::to_owned),
        }
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let req = request(Some("  "), Some(""));
        assert_eq!(req.validated().unwrap(), (None, None));
    }

    #[test]
    fn test_valid_update() {
        let req = request(Some(" Aisyah Rahman "), Some("+60 12-345 6789"));
        assert_eq!(
            req.validated().unwrap(),
            (Some("Aisyah Rahman"), Some("+60 12-345 6789"))
        );
    }

    #[test]
    fn test_invalid_phone() {
        assert!(request(None, Some("call me maybe")).validated().is_err());
    }
}
