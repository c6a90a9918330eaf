//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::CatalogCache;
use crate::config::StorefrontConfig;
use crate::stripe::{StripeClient, StripeError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    stripe: StripeClient,
    cache: CatalogCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the Stripe client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StripeError> {
        let stripe = StripeClient::new(&config.stripe)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                cache: CatalogCache::new(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Stripe API client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Get a reference to the catalog cache.
    #[must_use]
    pub fn cache(&self) -> &CatalogCache {
        &self.inner.cache
    }
}
