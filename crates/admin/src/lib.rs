//! Kedai admin library.
//!
//! The back-office JSON API: catalog and stock management, image uploads to
//! Supabase Storage, order status changes with Stripe refunds, EasyParcel
//! shipping labels, review moderation, store settings and user roles.
//!
//! # Security
//!
//! This crate holds the privileged credentials (Stripe refunds, EasyParcel
//! wallet, Supabase service role). Every API route resolves the caller's
//! role from the database (through the role cache) on each request.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod easyparcel;
pub mod error;
pub mod health;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod stripe;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
};

use crate::middleware::{
    Hsts, identity_middleware, request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// JSON bodies above this are rejected with 413. Image uploads raise it
/// per route.
pub const MAX_BODY_BYTES: usize = 256 * 1024;

/// API routes with identity resolution and the per-request layers.
///
/// Identity needs the session, so the binary must add the session layer
/// outside this router, along with tracing and Sentry.
pub fn app(state: &AppState) -> Router<AppState> {
    routes::routes()
        .layer(from_fn_with_state(state.clone(), identity_middleware))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn_with_state(
            Hsts(state.config().is_secure()),
            security_headers_middleware,
        ))
        .layer(from_fn(request_id_middleware))
}
