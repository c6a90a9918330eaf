//! Staff authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during staff login.
#[derive(Debug, Error)]
pub enum AdminAuthError {
    /// Wrong email or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Valid customer credentials; customers have no back-office access.
    #[error("staff access required")]
    NotStaff,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
