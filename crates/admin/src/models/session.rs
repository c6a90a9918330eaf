//! Session-related types for staff authentication.

use serde::{Deserialize, Serialize};

use kedai_core::{Email, ProfileId};

/// Session-stored staff identity.
///
/// No role here: it is resolved on every request through the role cache, so
/// a demotion applies to the next request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStaff {
    /// Profile ID.
    pub id: ProfileId,
    /// Email address at login time.
    pub email: Email,
}

/// Session keys for staff authentication data.
pub mod session_keys {
    /// Key for storing the current logged-in staff member.
    pub const CURRENT_STAFF: &str = "current_staff";
}
