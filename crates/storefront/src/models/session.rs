//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use kedai_core::{Email, ProfileId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Profile ID.
    pub id: ProfileId,
    /// Email address at login time.
    pub email: Email,
}

/// Session keys for type-safe session access.
pub mod session_keys {
    /// Key for the current user.
    pub const CURRENT_USER: &str = "current_user";
}
