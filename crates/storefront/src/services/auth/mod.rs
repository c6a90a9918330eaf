//! Customer authentication service.
//!
//! Email + password accounts with Argon2id hashes. Session handling lives in
//! the route layer; this service only validates and persists credentials.

mod error;

pub use error::AuthError;

use sqlx::PgPool;

use kedai_core::{Email, password};

use crate::db::{ProfileRepository, RepositoryError};
use crate::models::Profile;

/// Upper bound for the optional display name.
const MAX_NAME_LENGTH: usize = 120;

/// Authentication service.
pub struct AuthService<'a> {
    profiles: ProfileRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            profiles: ProfileRepository::new(pool),
        }
    }

    /// Register a new customer with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::Password` if the password doesn't meet requirements.
    /// Returns `AuthError::EmailTaken` if the email is already registered.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Profile, AuthError> {
        let email = Email::parse(email)?;
        password::validate(password)?;

        let full_name = full_name.map(str::trim).filter(|n| !n.is_empty());
        if full_name.is_some_and(|n| n.chars().count() > MAX_NAME_LENGTH) {
            return Err(AuthError::NameTooLong {
                max: MAX_NAME_LENGTH,
            });
        }

        let password_hash = password::hash(password)?;

        self.profiles
            .create_customer(&email, full_name, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// Unknown emails and wrong passwords produce the same error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<Profile, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (profile, password_hash) = self
            .profiles
            .get_with_password(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !password::verify(password, &password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(profile)
    }
}
