//! Kedai Core - Shared domain types and rules.
//!
//! This crate provides the types and pure business rules used by every Kedai
//! component:
//! - `storefront` - Public shop API (catalog, cart, checkout, reviews)
//! - `admin` - Back-office API (catalog management, orders, shipments)
//! - `cli` - Command-line tools for migrations, users, and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and rules - no database access and no
//! HTTP clients. Postgres encodings are available behind the `postgres`
//! feature so the binaries can bind these types directly in queries.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, emails, statuses, roles, addresses, settings
//! - [`pricing`] - Cart and order totals
//! - [`cart`] - Cart line rules
//! - [`order_number`] - Human-facing order number generation
//! - [`password`] - Password policy and Argon2id hashing

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order_number;
pub mod password;
pub mod pricing;
pub mod types;

pub use types::*;
