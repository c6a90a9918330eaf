//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! kedai-cli migrate
//! ```
//!
//! Applies the workspace `migrations/` directory, then creates the
//! `tower_sessions` schema used by both servers' session stores.
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

use super::{ConnectError, connect};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running schema migrations...");
    sqlx::migrate!("../../migrations").run(&pool).await?;

    tracing::info!("Running session store migration...");
    PostgresStore::new(pool.clone()).migrate().await?;

    tracing::info!("Migrations complete");
    Ok(())
}
