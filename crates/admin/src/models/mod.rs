//! Domain models for the back office.
//!
//! These are the API shapes returned by admin handlers. They include fields
//! the storefront never exposes (inactive products, stock conflicts, refund
//! IDs, moderation state).

pub mod catalog;
pub mod order;
pub mod review;
pub mod session;
pub mod user;

pub use catalog::{
    AdminCategory, AdminProduct, AdminProductSummary, AdminVariant, LowStockVariant, ProductImage,
};
pub use order::{
    AdminOrderDetail, AdminOrderSummary, Customer, OrderItem, Shipment, ShippingLine, StatusChange,
};
pub use review::AdminReview;
pub use session::{CurrentStaff, session_keys};
pub use user::UserSummary;
