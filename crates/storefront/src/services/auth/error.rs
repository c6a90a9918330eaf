//! Customer authentication errors.

use thiserror::Error;

use kedai_core::EmailError;
use kedai_core::password::PasswordError;

use crate::db::RepositoryError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Unknown email or wrong password; callers cannot tell which.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    EmailTaken,

    /// Rejected by the password policy, or hashing failed.
    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("name must be at most {max} characters")]
    NameTooLong { max: usize },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// Whether the caller can fix this by changing their input.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        match self {
            Self::Password(PasswordError::Hash(_)) | Self::Repository(_) => false,
            Self::InvalidEmail(_)
            | Self::InvalidCredentials
            | Self::EmailTaken
            | Self::Password(_)
            | Self::NameTooLong { .. } => true,
        }
    }
}
