//! Profiles as seen by admins.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kedai_core::{Email, ProfileId, Role};

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: ProfileId,
    pub email: Email,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub order_count: i64,
    pub created_at: DateTime<Utc>,
}
