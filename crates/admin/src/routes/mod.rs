//! HTTP route handlers for the back-office API.
//!
//! Every route below `/api` except login requires a resolved [`Identity`]
//! (see [`crate::middleware::identity_middleware`]).
//!
//! # Route Structure
//!
//! ```text
//! # Auth (strict rate limit)
//! POST   /api/auth/login                      - Staff/admin login
//! POST   /api/auth/logout                     - Log out
//! GET    /api/auth/me                         - Current identity
//!
//! # Catalog (staff)
//! GET    /api/categories                      - All categories
//! POST   /api/categories                      - Create
//! PATCH  /api/categories/{id}                 - Update
//! DELETE /api/categories/{id}                 - Delete (409 while in use)
//! GET    /api/products                        - Listing incl. inactive
//! POST   /api/products                        - Create
//! GET    /api/products/{id}                   - Detail with variants + images
//! PATCH  /api/products/{id}                   - Update
//! DELETE /api/products/{id}                   - Delete, or archive when ordered
//! POST   /api/products/{id}/variants          - Add variant
//! PATCH  /api/variants/{id}                   - Update variant
//! DELETE /api/variants/{id}                   - Delete variant
//! POST   /api/variants/{id}/stock             - Adjust stock by delta
//! PUT    /api/variants/{id}/stock             - Set absolute stock
//! GET    /api/inventory/low-stock             - Variants at/below threshold
//!
//! # Images (staff)
//! POST   /api/products/{id}/images            - Multipart upload
//! PUT    /api/products/{id}/images/order      - Rewrite sort order
//! POST   /api/images/{id}/primary             - Make primary
//! DELETE /api/images/{id}                     - Delete row + object
//!
//! # Orders & shipping (staff)
//! GET    /api/orders                          - Filtered listing
//! GET    /api/orders/{id}                     - Detail
//! POST   /api/orders/{id}/status              - Status change (refund/restock)
//! POST   /api/orders/{id}/shipment/rates      - EasyParcel rate check
//! POST   /api/orders/{id}/shipment            - Book + pay shipment
//! GET    /api/orders/{id}/shipment            - Current shipment
//! POST   /api/shipments/{id}/pay              - Retry a failed payment
//!
//! # Reviews (staff)
//! GET    /api/reviews                         - Moderation queue
//! POST   /api/reviews/{id}/approve            - Approve + notify
//! POST   /api/reviews/{id}/reject             - Reject
//! DELETE /api/reviews/{id}                    - Delete
//!
//! # Admin only
//! GET    /api/settings                        - Store settings
//! PUT    /api/settings                        - Replace store settings
//! GET    /api/users                           - Users by role / search
//! PUT    /api/users/{id}/role                 - Change role
//! ```
//!
//! [`Identity`]: crate::middleware::Identity

pub mod auth;
pub mod catalog;
pub mod images;
pub mod orders;
pub mod reviews;
pub mod settings;
pub mod shipments;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::services::images::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Multipart framing on top of the largest accepted image.
const UPLOAD_BODY_BYTES: usize = MAX_IMAGE_BYTES + 64 * 1024;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route(
            "/categories/{id}",
            patch(catalog::update_category).delete(catalog::delete_category),
        )
        .route(
            "/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route(
            "/products/{id}",
            get(catalog::get_product)
                .patch(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route("/products/{id}/variants", post(catalog::create_variant))
        .route(
            "/variants/{id}",
            patch(catalog::update_variant).delete(catalog::delete_variant),
        )
        .route(
            "/variants/{id}/stock",
            post(catalog::adjust_stock).put(catalog::set_stock),
        )
        .route("/inventory/low-stock", get(catalog::low_stock))
}

/// Create the image routes router.
pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products/{id}/images",
            post(images::upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_BYTES)),
        )
        .route("/products/{id}/images/order", put(images::reorder))
        .route("/images/{id}/primary", post(images::set_primary))
        .route("/images/{id}", delete(images::delete))
}

/// Create the order and shipment routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::change_status))
        .route("/orders/{id}/shipment/rates", post(shipments::rates))
        .route(
            "/orders/{id}/shipment",
            get(shipments::show).post(shipments::book),
        )
        .route("/shipments/{id}/pay", post(shipments::retry_payment))
}

/// Create the review moderation routes router.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(reviews::list))
        .route("/{id}", delete(reviews::delete))
        .route("/{id}/approve", post(reviews::approve))
        .route("/{id}/reject", post(reviews::reject))
}

/// Create the admin-only routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/settings", get(settings::show).put(settings::update))
        .route("/users", get(users::list))
        .route("/users/{id}/role", put(users::set_role))
}

/// Create all routes for the admin API.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(catalog_routes())
        .merge(image_routes())
        .merge(order_routes())
        .nest("/reviews", review_routes())
        .merge(admin_routes())
        .layer(api_rate_limiter());

    Router::new()
        .nest("/api/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/api", api)
}
