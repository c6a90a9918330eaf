//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create the first admin (password from -p or KEDAI_USER_PASSWORD)
//! kedai-cli user create -e owner@example.com -n "Store Owner" -r admin
//!
//! # Promote or demote an existing account
//! kedai-cli user set-role -e helper@example.com -r staff
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `KEDAI_USER_PASSWORD` - Password for `user create` when `-p` is omitted
//! - `REDIS_URL` - When set, `set-role` also drops the cached role

use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;

use kedai_admin::config::RoleCacheConfig;
use kedai_admin::services::RoleCache;
use kedai_core::password::{self, PasswordError};
use kedai_core::{Email, ProfileId, Role};

use super::{ConnectError, connect, required_secret};

/// Env var read when no password flag is given.
pub const PASSWORD_ENV: &str = "KEDAI_USER_PASSWORD";

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid role: {0}. Valid roles: customer, staff, admin")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Password required: pass -p or set {PASSWORD_ENV}")]
    MissingPassword,

    #[error("Invalid password: {0}")]
    Password(#[from] PasswordError),

    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error("No user with email: {0}")]
    NotFound(String),
}

fn parse_role(role: &str) -> Result<Role, UserError> {
    role.parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))
}

fn parse_email(email: &str) -> Result<Email, UserError> {
    Email::parse(email).map_err(|_| UserError::InvalidEmail(email.to_owned()))
}

/// Pick the password from the flag, falling back to the environment.
fn resolve_password(flag: Option<String>, env: Option<String>) -> Result<String, UserError> {
    flag.or(env)
        .filter(|p| !p.is_empty())
        .ok_or(UserError::MissingPassword)
}

/// Create a profile with a role and password.
///
/// # Errors
///
/// Returns an error if the input is invalid, the email is taken, or the
/// database is unreachable.
pub async fn create(
    email: &str,
    name: &str,
    role: &str,
    password: Option<String>,
) -> Result<ProfileId, UserError> {
    let role = parse_role(role)?;
    let email = parse_email(email)?;
    let password = resolve_password(password, std::env::var(PASSWORD_ENV).ok())?;
    password::validate(&password)?;
    let password_hash = password::hash(&password)?;

    let pool = connect().await?;
    tracing::info!("Creating user: {} ({})", email, role);

    let id = insert_profile(&pool, &email, name, role, &password_hash).await?;

    tracing::info!("User created. ID: {}, Email: {}, Role: {}", id, email, role);
    Ok(id)
}

async fn insert_profile(
    pool: &PgPool,
    email: &Email,
    name: &str,
    role: Role,
    password_hash: &str,
) -> Result<ProfileId, UserError> {
    let mut tx = pool.begin().await?;

    let id = sqlx::query_scalar::<_, ProfileId>(
        r"
        INSERT INTO profiles (email, full_name, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO NOTHING
        RETURNING id
        ",
    )
    .bind(email.as_str())
    .bind(Some(name.trim()).filter(|n| !n.is_empty()))
    .bind(role)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| UserError::UserExists(email.to_string()))?;

    sqlx::query("INSERT INTO auth_credentials (profile_id, password_hash) VALUES ($1, $2)")
        .bind(id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(id)
}

/// Change the role of an existing profile.
///
/// # Errors
///
/// Returns `UserError::NotFound` if no profile has this email.
pub async fn set_role(email: &str, role: &str) -> Result<(), UserError> {
    let role = parse_role(role)?;
    let email = parse_email(email)?;

    let pool = connect().await?;

    let id = sqlx::query_scalar::<_, ProfileId>(
        "UPDATE profiles SET role = $2, updated_at = now() WHERE email = $1 RETURNING id",
    )
    .bind(email.as_str())
    .bind(role)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| UserError::NotFound(email.to_string()))?;

    invalidate_cached_role(id).await;

    tracing::info!("Role updated. ID: {}, Email: {}, Role: {}", id, email, role);
    Ok(())
}

/// Drop the shared cached role so running admin servers see the change.
async fn invalidate_cached_role(id: ProfileId) {
    let Ok(redis_url) = required_secret("REDIS_URL") else {
        return;
    };

    let config = RoleCacheConfig {
        redis_url: Some(redis_url),
        ttl: Duration::from_secs(60),
    };
    match RoleCache::connect(&config).await {
        Ok(cache) => cache.invalidate(id).await,
        Err(e) => tracing::warn!(
            error = %e,
            "Could not reach Redis; admin servers keep the old role until the cache TTL expires"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("admin").unwrap(), Role::Admin);
        assert_eq!(parse_role("staff").unwrap(), Role::Staff);
        assert!(matches!(
            parse_role("super_admin"),
            Err(UserError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_parse_email() {
        assert!(parse_email("owner@kedai.test").is_ok());
        assert!(matches!(
            parse_email("not-an-email"),
            Err(UserError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_password_flag_wins_over_env() {
        let picked = resolve_password(Some("from-flag".into()), Some("from-env".into())).unwrap();
        assert_eq!(picked, "from-flag");
    }

    #[test]
    fn test_password_falls_back_to_env() {
        let picked = resolve_password(None, Some("from-env".into())).unwrap();
        assert_eq!(picked, "from-env");
    }

    #[test]
    fn test_password_required() {
        assert!(matches!(
            resolve_password(None, None),
            Err(UserError::MissingPassword)
        ));
        assert!(matches!(
            resolve_password(Some(String::new()), None),
            Err(UserError::MissingPassword)
        ));
    }
}
