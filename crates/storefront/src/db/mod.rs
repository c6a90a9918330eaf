//! Database operations for the storefront.
//!
//! The storefront reads the catalog and owns the customer-side tables:
//!
//! - `profiles` / `auth_credentials` - Customer accounts
//! - `cart_items` - Server-side carts
//! - `orders` / `order_items` - Created at checkout, paid by the Stripe webhook
//! - `product_reviews` - Customer reviews
//! - `notifications` - In-app notifications
//! - `stripe_events` - Webhook idempotency ledger
//!
//! # Migrations
//!
//! Migrations live in the workspace `migrations/` directory and run via:
//! ```bash
//! cargo run -p kedai-cli -- migrate
//! ```

pub mod cart;
pub mod catalog;
pub mod notifications;
pub mod orders;
pub mod profiles;
pub mod reviews;
pub mod settings;
pub mod webhooks;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart::CartRepository;
pub use catalog::CatalogRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use profiles::ProfileRepository;
pub use reviews::ReviewRepository;
pub use settings::SettingsRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to `Conflict`, everything else to `Database`.
    pub(crate) fn from_unique(err: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(conflict.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
