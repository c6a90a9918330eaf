//! Domain models for the storefront API.
//!
//! These are the shapes handlers serialize to JSON. Database row types stay
//! private to the repositories in [`crate::db`].

pub mod cart;
pub mod catalog;
pub mod notification;
pub mod order;
pub mod profile;
pub mod review;
pub mod session;

pub use cart::{CartLine, CartView};
pub use catalog::{
    Category, ProductDetail, ProductFilter, ProductImage, ProductSort, ProductSummary, Variant,
};
pub use notification::Notification;
pub use order::{OrderDetail, OrderItem, OrderSummary, ShipmentTracking};
pub use profile::Profile;
pub use review::{RatingSummary, Review};
pub use session::{CurrentUser, session_keys};
