//! Password policy and hashing.
//!
//! Hashes are Argon2id PHC strings (`$argon2id$v=19$...`) stored in
//! `auth_credentials.password_hash`.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

pub const MIN_LENGTH: usize = 8;
pub const MAX_LENGTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    #[error("password must be at least {MIN_LENGTH} characters")]
    TooShort,
    #[error("password must be at most {MAX_LENGTH} characters")]
    TooLong,
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Check a new password against the policy.
///
/// # Errors
///
/// Returns `TooShort` or `TooLong`.
pub fn validate(password: &str) -> Result<(), PasswordError> {
    let len = password.chars().count();
    if len < MIN_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if len > MAX_LENGTH {
        return Err(PasswordError::TooLong);
    }
    Ok(())
}

/// Hash a password with a fresh random salt.
///
/// # Errors
///
/// Returns `PasswordError::Hash` if Argon2 fails.
pub fn hash(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Verify a password against a stored hash. Malformed hashes never verify.
#[must_use]
pub fn verify(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_policy() {
        assert_eq!(validate("short"), Err(PasswordError::TooShort));
        assert!(validate("longenough").is_ok());
        assert_eq!(validate(&"x".repeat(129)), Err(PasswordError::TooLong));
    }

    #[test]
    fn test_hash_and_verify() {
        let hashed = hash("correct horse").unwrap();
        assert!(hashed.starts_with("$argon2id$"));
        assert!(verify("correct horse", &hashed));
        assert!(!verify("wrong horse", &hashed));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash("same").unwrap(), hash("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        assert!(!verify("anything", "not-a-phc-string"));
    }
}
