//! Core types for Kedai.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod email;
pub mod id;
pub mod pagination;
pub mod price;
pub mod rating;
pub mod role;
pub mod settings;
pub mod slug;
pub mod status;

pub use address::{AddressError, ShippingAddress};
pub use email::{Email, EmailError};
pub use id::*;
pub use pagination::{PageRequest, Paginated};
pub use price::{CurrencyCode, MoneyError, Price};
pub use rating::{Rating, RatingError};
pub use role::Role;
pub use settings::{SettingsError, ShipFrom, StoreSettings};
pub use slug::{Slug, SlugError};
pub use status::*;
