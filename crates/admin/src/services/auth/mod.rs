//! Staff authentication service.
//!
//! Staff and admins sign in with the same email + password accounts as
//! customers. Only the credential check and the staff gate live here; the
//! role is never stored in the session and is re-resolved on every request
//! through the role cache.

mod error;

pub use error::AdminAuthError;

use sqlx::PgPool;

use kedai_core::{Email, Role, password};

use crate::db::ProfileRepository;
use crate::models::CurrentStaff;

/// Result of a successful staff login.
#[derive(Debug, Clone)]
pub struct StaffLogin {
    pub staff: CurrentStaff,
    pub full_name: Option<String>,
    pub role: Role,
}

/// Staff authentication service.
pub struct AdminAuthService<'a> {
    profiles: ProfileRepository<'a>,
}

impl<'a> AdminAuthService<'a> {
    /// Create a new staff authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            profiles: ProfileRepository::new(pool),
        }
    }

    /// Check credentials and require a staff role.
    ///
    /// The password is verified before the role is looked at, so a wrong
    /// password never reveals whether an account is staff.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AdminAuthError::NotStaff` for valid customer credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<StaffLogin, AdminAuthError> {
        let email = Email::parse(email).map_err(|_| AdminAuthError::InvalidCredentials)?;

        let record = self
            .profiles
            .login_record(&email)
            .await?
            .ok_or(AdminAuthError::InvalidCredentials)?;

        if !password::verify(password, &record.password_hash) {
            return Err(AdminAuthError::InvalidCredentials);
        }

        if !record.role.is_staff() {
            tracing::warn!(profile_id = %record.id, "Customer attempted back-office login");
            return Err(AdminAuthError::NotStaff);
        }

        Ok(StaffLogin {
            staff: CurrentStaff {
                id: record.id,
                email: record.email,
            },
            full_name: record.full_name,
            role: record.role,
        })
    }
}
