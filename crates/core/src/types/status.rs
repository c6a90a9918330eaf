//! Status enums for orders, payments, shipments, reviews, and notifications.
//!
//! Each enum maps one-to-one onto a Postgres enum type created by the
//! migrations, so labels here must match the SQL labels exactly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// ```text
/// pending ──► paid ──► processing ──► shipped ──► delivered
///    │          │           │            │            │
///    ▼          ├──► shipped│            │            │
/// cancelled ◄───┴───────────┤            │            │
///            refunded ◄─────┴────────────┴────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Paid,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Refunded,
    ];

    /// Whether an order may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled)
                | (
                    Self::Paid,
                    Self::Processing | Self::Shipped | Self::Cancelled | Self::Refunded
                )
                | (
                    Self::Processing,
                    Self::Shipped | Self::Cancelled | Self::Refunded
                )
                | (Self::Shipped, Self::Delivered | Self::Refunded)
                | (Self::Delivered, Self::Refunded)
        )
    }

    /// No further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// The customer has paid for this order (and it was not reversed).
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Processing | Self::Shipped | Self::Delivered
        )
    }

    /// Whether moving to `next` should return the order's stock to inventory.
    ///
    /// Only orders whose stock was taken (paid) and whose goods never left the
    /// warehouse are restocked.
    #[must_use]
    pub const fn restocks_on(self, next: Self) -> bool {
        matches!(self, Self::Paid | Self::Processing)
            && matches!(next, Self::Cancelled | Self::Refunded)
    }

    /// Whether moving to `next` requires refunding the payment.
    #[must_use]
    pub const fn refunds_on(self, next: Self) -> bool {
        self.is_paid() && matches!(next, Self::Cancelled | Self::Refunded)
    }

    /// Database / API label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Customer-facing label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Awaiting payment",
            Self::Paid => "Payment received",
            Self::Processing => "Being prepared",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Refunded,
    Failed,
}

/// EasyParcel shipment status.
///
/// A shipment is `submitted` once EasyParcel accepted the order and `paid`
/// once the label was bought and an AWB number assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shipment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Submitted,
    Paid,
    Failed,
}

impl ShipmentStatus {
    /// A shipment in this state blocks creating another one for the order.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Submitted | Self::Paid)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product review moderation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "review_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Kind of in-app notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "notification_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderStatus,
    Shipment,
    Review,
    StockAlert,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use OrderStatus::*;
        let path = [Pending, Paid, Processing, Shipped, Delivered];
        for pair in path.windows(2) {
            if let [from, to] = pair {
                assert!(from.can_transition_to(*to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_rejected_transitions() {
        use OrderStatus::*;
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Shipped));
        assert!(!Paid.can_transition_to(Pending));
        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(status), "self loop on {status}");
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            assert!(from.is_terminal());
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_restock_rules() {
        use OrderStatus::*;
        assert!(Paid.restocks_on(Cancelled));
        assert!(Processing.restocks_on(Refunded));
        assert!(!Shipped.restocks_on(Refunded));
        assert!(!Pending.restocks_on(Cancelled));
    }

    #[test]
    fn test_refund_rules() {
        use OrderStatus::*;
        assert!(Paid.refunds_on(Cancelled));
        assert!(Delivered.refunds_on(Refunded));
        assert!(!Pending.refunds_on(Cancelled));
        assert!(!Paid.refunds_on(Processing));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
            let json = serde_json::to_string(&status).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_shipment_active() {
        assert!(ShipmentStatus::Submitted.is_active());
        assert!(ShipmentStatus::Paid.is_active());
        assert!(!ShipmentStatus::Failed.is_active());
    }
}
