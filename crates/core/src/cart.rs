//! Cart line rules shared by the cart and checkout.

use serde::Serialize;
use thiserror::Error;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity must be at least 1")]
    TooSmall,
    #[error("quantity cannot exceed {MAX_LINE_QUANTITY}")]
    TooLarge,
}

/// Check a cart line quantity.
///
/// # Errors
///
/// Returns [`QuantityError`] when `quantity` is outside `1..=99`.
pub const fn validate_quantity(quantity: i32) -> Result<i32, QuantityError> {
    if quantity < 1 {
        Err(QuantityError::TooSmall)
    } else if quantity > MAX_LINE_QUANTITY {
        Err(QuantityError::TooLarge)
    } else {
        Ok(quantity)
    }
}

/// Why a cart line cannot be bought as it stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineIssue {
    /// The product or variant was deactivated.
    Unavailable,
    OutOfStock,
    /// Some stock left, but less than the line quantity.
    InsufficientStock,
}

/// Availability of a line given the current catalog state.
#[must_use]
pub const fn line_issue(active: bool, stock: i32, quantity: i32) -> Option<LineIssue> {
    if !active {
        Some(LineIssue::Unavailable)
    } else if stock <= 0 {
        Some(LineIssue::OutOfStock)
    } else if stock < quantity {
        Some(LineIssue::InsufficientStock)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert_eq!(validate_quantity(0), Err(QuantityError::TooSmall));
        assert_eq!(validate_quantity(-4), Err(QuantityError::TooSmall));
        assert_eq!(validate_quantity(1), Ok(1));
        assert_eq!(validate_quantity(99), Ok(99));
        assert_eq!(validate_quantity(100), Err(QuantityError::TooLarge));
    }

    #[test]
    fn test_line_issue() {
        assert_eq!(line_issue(false, 10, 1), Some(LineIssue::Unavailable));
        assert_eq!(line_issue(true, 0, 1), Some(LineIssue::OutOfStock));
        assert_eq!(line_issue(true, 2, 3), Some(LineIssue::InsufficientStock));
        assert_eq!(line_issue(true, 3, 3), None);
    }
}
