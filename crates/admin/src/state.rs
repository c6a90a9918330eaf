//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::config::AdminConfig;
use crate::easyparcel::{EasyParcelClient, EasyParcelError};
use crate::services::{
    CatalogService, EmailService, ImageService, LifecycleService, RoleCache, ShippingService,
};
use crate::storage::{StorageClient, StorageError};
use crate::stripe::{StripeClient, StripeError};

/// Errors building the shared API clients at start-up.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Stripe client: {0}")]
    Stripe(#[from] StripeError),

    #[error("EasyParcel client: {0}")]
    EasyParcel(#[from] EasyParcelError),

    #[error("Storage client: {0}")]
    Storage(#[from] StorageError),

    #[error("SMTP transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    roles: RoleCache,
    stripe: StripeClient,
    easyparcel: EasyParcelClient,
    storage: StorageClient,
    email: Option<EmailService>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if any API client cannot be built.
    pub fn new(config: AdminConfig, pool: PgPool, roles: RoleCache) -> Result<Self, StateError> {
        let stripe = StripeClient::new(&config.stripe)?;
        let easyparcel = EasyParcelClient::new(&config.easyparcel)?;
        let storage = StorageClient::new(&config.storage)?;
        let email = config.email.as_ref().map(EmailService::new).transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                roles,
                stripe,
                easyparcel,
                storage,
                email,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Role cache consulted by the identity middleware.
    #[must_use]
    pub fn roles(&self) -> &RoleCache {
        &self.inner.roles
    }

    #[must_use]
    pub fn storage(&self) -> &StorageClient {
        &self.inner.storage
    }

    /// Catalog writes.
    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(&self.inner.pool, &self.inner.storage)
    }

    /// Product image uploads.
    #[must_use]
    pub fn images(&self) -> ImageService<'_> {
        ImageService::new(&self.inner.pool, &self.inner.storage)
    }

    /// Order status changes, refunds included.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleService<'_> {
        LifecycleService::new(
            &self.inner.pool,
            &self.inner.stripe,
            self.inner.email.as_ref(),
        )
    }

    /// EasyParcel bookings.
    #[must_use]
    pub fn shipping(&self) -> ShippingService<'_> {
        ShippingService::new(&self.inner.pool, &self.inner.easyparcel, self.lifecycle())
    }
}
