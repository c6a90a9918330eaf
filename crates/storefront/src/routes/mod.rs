//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (strict rate limit)
//! POST   /api/auth/register                 - Create customer account, log in
//! POST   /api/auth/login                    - Log in
//! POST   /api/auth/logout                   - Log out
//! GET    /api/auth/me                       - Current profile
//!
//! # Catalog (public)
//! GET    /api/categories                    - Category list
//! GET    /api/products                      - Filtered, paginated listing
//! GET    /api/products/{slug}               - Product detail
//! GET    /api/products/{slug}/reviews       - Approved reviews + rating summary
//!
//! # Cart (requires auth)
//! GET    /api/cart                          - Cart with totals
//! DELETE /api/cart                          - Empty the cart
//! POST   /api/cart/items                    - Add a variant
//! PATCH  /api/cart/items/{id}               - Set quantity (0 removes)
//! DELETE /api/cart/items/{id}               - Remove a line
//!
//! # Checkout (requires auth)
//! POST   /api/checkout                      - Create pending order + Stripe session
//! GET    /api/checkout/orders/{order_id}    - Poll order status after redirect
//!
//! # Reviews (requires auth)
//! POST   /api/products/{slug}/reviews       - Submit a review
//! DELETE /api/reviews/{id}                  - Delete own review
//!
//! # Account (requires auth)
//! GET    /api/account                       - Profile
//! PATCH  /api/account                       - Update name / phone
//! GET    /api/account/orders                - Order history
//! GET    /api/account/orders/{id}           - Order detail with tracking
//!
//! # Notifications (requires auth)
//! GET    /api/notifications                 - List (?unread=true)
//! GET    /api/notifications/unread-count    - Badge count
//! POST   /api/notifications/{id}/read       - Mark one read
//! POST   /api/notifications/read-all        - Mark all read
//!
//! # Webhooks (signature-verified, not rate limited)
//! POST   /api/webhooks/stripe               - Stripe events
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod notifications;
pub mod reviews;
pub mod webhooks;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the catalog and review routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(catalog::categories))
        .route("/products", get(catalog::products))
        .route("/products/{slug}", get(catalog::product))
        .route(
            "/products/{slug}/reviews",
            get(reviews::list).post(reviews::create),
        )
        .route("/reviews/{id}", delete(reviews::delete))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::start))
        .route("/orders/{order_id}", get(checkout::order_status))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::show).patch(account::update))
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
}

/// Create the notification routes router.
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::list))
        .route("/unread-count", get(notifications::unread_count))
        .route("/read-all", post(notifications::mark_all_read))
        .route("/{id}/read", post(notifications::mark_read))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(catalog_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/account", account_routes())
        .nest("/notifications", notification_routes())
        .layer(api_rate_limiter())
        // Added after the limiter so Stripe retries are never throttled.
        .route("/webhooks/stripe", post(webhooks::stripe));

    Router::new()
        .nest("/api/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/api", api)
}
