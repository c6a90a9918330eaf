//! Database operations for the back office.
//!
//! The admin binary shares the storefront's database and owns the staff side
//! of it:
//!
//! - `categories` / `products` / `product_variants` / `product_images` - Catalog management
//! - `orders` / `order_status_history` - Fulfilment and refunds
//! - `shipments` - EasyParcel bookings
//! - `product_reviews` - Moderation
//! - `store_settings` - Runtime configuration
//! - `profiles` - Role management
//!
//! # Migrations
//!
//! Migrations live in the workspace `migrations/` directory and run via:
//! ```bash
//! cargo run -p kedai-cli -- migrate
//! ```

pub mod categories;
pub mod images;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod profiles;
pub mod reviews;
pub mod settings;
pub mod shipments;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use categories::CategoryRepository;
pub use images::ImageRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use profiles::ProfileRepository;
pub use reviews::ReviewRepository;
pub use settings::SettingsRepository;
pub use shipments::ShipmentRepository;

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

    /// Constraint violation (e.g., duplicate slug, referenced row).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique and foreign-key violations to `Conflict`, everything else to `Database`.
    pub(crate) fn from_constraint(err: sqlx::Error, conflict: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
        {
            return Self::Conflict(conflict.to_owned());
        }
        Self::Database(err)
    }
}

/// Escape `ILIKE` wildcards in user input and wrap it in `%...%`.
pub(crate) fn like_pattern(q: Option<&str>) -> Option<String> {
    let q = q?.trim();
    if q.is_empty() {
        return None;
    }
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some(" 50%_off ")).as_deref(), Some("%50\\%\\_off%"));
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(None), None);
    }
}
