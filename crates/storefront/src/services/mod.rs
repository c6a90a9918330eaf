//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Customer registration and login
//! - `cart` - Cart mutations with live stock checks
//! - `checkout` - Cart to pending order to Stripe Checkout Session
//! - `payments` - Stripe webhook processing and order materialization
//! - `reviews` - Review submission rules

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod payments;
pub mod reviews;

pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService};
pub use checkout::{CheckoutError, CheckoutService, CheckoutStarted};
pub use payments::{PaymentError, PaymentService, WebhookOutcome};
pub use reviews::{ReviewError, ReviewInput, ReviewService};
