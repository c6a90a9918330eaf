//! Customer profile.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kedai_core::{Email, ProfileId, Role};

/// A profile as returned by `/api/auth/me` and `/api/account`.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: ProfileId,
    pub email: Email,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
