//! CLI subcommands.

pub mod migrate;
pub mod seed;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// A required environment variable is missing.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct EnvError(pub &'static str);

/// Read a required environment variable as a secret.
fn required_secret(name: &'static str) -> Result<SecretString, EnvError> {
    std::env::var(name)
        .map(SecretString::from)
        .map_err(|_| EnvError(name))
}

/// Connect to the database named by `DATABASE_URL`.
async fn connect() -> Result<PgPool, ConnectError> {
    let database_url = required_secret("DATABASE_URL")?;
    tracing::info!("Connecting to database...");
    Ok(kedai_admin::db::create_pool(&database_url).await?)
}

/// Errors from [`connect`].
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}
