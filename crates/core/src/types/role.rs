//! Profile roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role attached to a profile.
///
/// Roles are ordered: `Customer < Staff < Admin`, so permission checks can be
/// expressed as [`Role::at_least`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Staff,
    Admin,
}

impl Role {
    /// Whether this role grants at least the privileges of `required`.
    #[must_use]
    pub fn at_least(self, required: Self) -> bool {
        self >= required
    }

    /// Back-office access at all.
    #[must_use]
    pub fn is_staff(self) -> bool {
        self.at_least(Self::Staff)
    }

    #[must_use]
    pub fn can_manage_catalog(self) -> bool {
        self.at_least(Self::Staff)
    }

    #[must_use]
    pub fn can_manage_orders(self) -> bool {
        self.at_least(Self::Staff)
    }

    #[must_use]
    pub fn can_manage_settings(self) -> bool {
        self.at_least(Self::Admin)
    }

    #[must_use]
    pub fn can_manage_users(self) -> bool {
        self.at_least(Self::Admin)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Role::Admin.at_least(Role::Staff));
        assert!(Role::Staff.at_least(Role::Staff));
        assert!(!Role::Customer.at_least(Role::Staff));
    }

    #[test]
    fn test_permissions() {
        assert!(Role::Staff.can_manage_catalog());
        assert!(Role::Staff.can_manage_orders());
        assert!(!Role::Staff.can_manage_settings());
        assert!(!Role::Staff.can_manage_users());
        assert!(Role::Admin.can_manage_users());
        assert!(!Role::Customer.is_staff());
    }

    #[test]
    fn test_string_roundtrip() {
        for role in [Role::Customer, Role::Staff, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }
        assert_eq!(" ADMIN ".parse::<Role>(), Ok(Role::Admin));
        assert!("owner".parse::<Role>().is_err());
    }
}
