//! Unified error handling for admin.
//!
//! Handlers return `Result<T, AppError>`. Responses are JSON
//! `{"error": "<message>"}`; server-side failures are captured to Sentry and
//! their details never reach the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::easyparcel::EasyParcelError;
use crate::services::{
    AdminAuthError, CatalogError, ImageError, LifecycleError, ShippingError,
};

/// Application-level error type for the admin API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Auth error: {0}")]
    Auth(#[from] AdminAuthError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Order error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Shipping error: {0}")]
    Shipping(#[from] ShippingError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request is well-formed but not allowed in the current state.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn repository_message(err: &RepositoryError) -> String {
    match err {
        RepositoryError::NotFound => "Not found".to_string(),
        RepositoryError::Conflict(msg) => msg.clone(),
        _ => "Internal server error".to_string(),
    }
}

const fn lifecycle_status(err: &LifecycleError) -> StatusCode {
    match err {
        LifecycleError::NotFound => StatusCode::NOT_FOUND,
        LifecycleError::InvalidTransition { .. } | LifecycleError::MissingPayment => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LifecycleError::Concurrent => StatusCode::CONFLICT,
        LifecycleError::Refund(_) => StatusCode::BAD_GATEWAY,
        LifecycleError::Repository(e) => repository_status(e),
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => match err {
                AdminAuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AdminAuthError::NotStaff => StatusCode::FORBIDDEN,
                AdminAuthError::Repository(e) => repository_status(e),
            },
            Self::Catalog(err) => match err {
                CatalogError::Validation(_) | CatalogError::Slug(_) => StatusCode::BAD_REQUEST,
                CatalogError::NotFound => StatusCode::NOT_FOUND,
                CatalogError::Repository(e) => repository_status(e),
            },
            Self::Image(err) => match err {
                ImageError::UnsupportedType(_)
                | ImageError::Empty
                | ImageError::ContentMismatch(_)
                | ImageError::Validation(_) => StatusCode::BAD_REQUEST,
                ImageError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
                ImageError::NotFound => StatusCode::NOT_FOUND,
                ImageError::Storage(_) => StatusCode::BAD_GATEWAY,
                ImageError::Repository(e) => repository_status(e),
            },
            Self::Lifecycle(err) => lifecycle_status(err),
            Self::Shipping(err) => match err {
                ShippingError::OrderNotFound | ShippingError::ShipmentNotFound => {
                    StatusCode::NOT_FOUND
                }
                ShippingError::NotShippable(_)
                | ShippingError::AlreadyBooked
                | ShippingError::NotPayable(_)
                | ShippingError::PaymentInProgress => StatusCode::CONFLICT,
                ShippingError::UnknownState(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ShippingError::CollectDateInPast => StatusCode::BAD_REQUEST,
                ShippingError::PaymentFailed { .. } | ShippingError::Courier(_) => {
                    StatusCode::BAD_GATEWAY
                }
                ShippingError::Lifecycle(e) => lifecycle_status(e),
                ShippingError::Repository(e) => repository_status(e),
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            return "Internal server error".to_string();
        }
        match self {
            Self::Database(err)
            | Self::Auth(AdminAuthError::Repository(err))
            | Self::Catalog(CatalogError::Repository(err))
            | Self::Image(ImageError::Repository(err))
            | Self::Lifecycle(LifecycleError::Repository(err))
            | Self::Shipping(
                ShippingError::Repository(err)
                | ShippingError::Lifecycle(LifecycleError::Repository(err)),
            ) => repository_message(err),
            Self::Auth(AdminAuthError::InvalidCredentials) => {
                "Invalid email or password".to_string()
            }
            Self::Auth(AdminAuthError::NotStaff) => "Staff access required".to_string(),
            Self::Image(ImageError::Storage(_)) => {
                "Image storage unavailable, please try again".to_string()
            }
            Self::Lifecycle(LifecycleError::Refund(_))
            | Self::Shipping(ShippingError::Lifecycle(LifecycleError::Refund(_))) => {
                "Stripe refund failed; the order was not changed".to_string()
            }
            Self::Shipping(ShippingError::PaymentFailed { .. }) => {
                "Label payment failed; the booking was saved and can be retried".to_string()
            }
            Self::Shipping(ShippingError::Courier(err)) => match err {
                EasyParcelError::NoRates | EasyParcelError::Failed(_) => err.to_string(),
                _ => "Courier service unavailable, please try again".to_string(),
            },
            Self::Catalog(err) => err.to_string(),
            Self::Image(err) => err.to_string(),
            Self::Lifecycle(err) => err.to_string(),
            Self::Shipping(err) => err.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Validation(msg) => msg.clone(),
            Self::RateLimited => "Too many requests".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for a staff member.
pub fn set_sentry_user(profile_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(profile_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use kedai_core::{OrderStatus, ShipmentId};

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order-123".to_string());
        assert_eq!(err.to_string(), "Not found: order-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::Forbidden("test".to_string()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Auth(AdminAuthError::NotStaff).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Lifecycle(LifecycleError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped,
            })
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Shipping(ShippingError::AlreadyBooked).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Shipping(ShippingError::Lifecycle(LifecycleError::Concurrent)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Database(RepositoryError::Conflict("SKU already exists".to_string()))
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Image(ImageError::TooLarge).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn test_payment_failure_is_bad_gateway() {
        let (status, body) = body_of(AppError::Shipping(ShippingError::PaymentFailed {
            shipment_id: ShipmentId::generate(),
            message: "Insufficient credit. api_key=abc".to_string(),
        }))
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!body["error"].as_str().unwrap().contains("api_key"));
    }

    #[tokio::test]
    async fn test_concurrent_label_payment_is_conflict() {
        let (status, body) = body_of(AppError::Shipping(ShippingError::PaymentInProgress)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body["error"],
            "label payment for this shipment is already in progress"
        );
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (status, body) = body_of(AppError::Catalog(CatalogError::Repository(
            RepositoryError::DataCorruption("bad json in row 7".to_string()),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");

        let (status, body) =
            body_of(AppError::Database(RepositoryError::Conflict("SKU already exists".to_string())))
                .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "SKU already exists");
    }
}
