//! Business logic for the back office.

pub mod auth;
pub mod catalog;
pub mod email;
pub mod images;
pub mod lifecycle;
pub mod reviews;
pub mod role_cache;
pub mod shipping;

pub use auth::{AdminAuthError, AdminAuthService};
pub use catalog::{CatalogError, CatalogService};
pub use email::{EmailError, EmailService};
pub use images::{ImageError, ImageService};
pub use lifecycle::{LifecycleError, LifecycleService};
pub use role_cache::RoleCache;
pub use shipping::{ShippingError, ShippingService};
