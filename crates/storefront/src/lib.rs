//! Kedai storefront library.
//!
//! The customer-facing JSON API: catalog browsing, server-side carts,
//! Stripe Checkout, reviews, notifications, and the Stripe webhook that
//! turns pending orders into paid ones. Exposed as a library so the
//! binary stays thin and handlers can be exercised in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;

use axum::{Router, middleware::from_fn, middleware::from_fn_with_state};
use tower_http::limit::RequestBodyLimitLayer;

use crate::middleware::{Hsts, request_id_middleware, security_headers_middleware};
use crate::state::AppState;

/// Request bodies above this are rejected with 413.
pub const MAX_BODY_BYTES: usize = 256 * 1024;

/// API routes with the per-request layers that do not need a database.
///
/// Session, tracing, and Sentry layers are added by the binary.
pub fn app(state: &AppState) -> Router<AppState> {
    routes::routes()
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(from_fn_with_state(
            Hsts(state.config().is_secure()),
            security_headers_middleware,
        ))
        .layer(from_fn(request_id_middleware))
}
