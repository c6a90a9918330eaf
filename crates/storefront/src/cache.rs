//! In-process read cache for catalog data.
//!
//! Categories and product pages are cached for 5 minutes, store settings for
//! one minute. Cart, checkout and webhook code always read live stock from the
//! database; a cached product page may show stock that is a few minutes old.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use kedai_core::StoreSettings;

use crate::db::{CatalogRepository, RepositoryError, SettingsRepository};
use crate::models::{Category, ProductDetail};

const CATALOG_TTL: Duration = Duration::from_secs(300);
const SETTINGS_TTL: Duration = Duration::from_secs(60);

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Product(Arc<ProductDetail>),
}

/// Catalog and settings cache.
#[derive(Clone)]
pub struct CatalogCache {
    catalog: Cache<String, CacheValue>,
    settings: Cache<(), Arc<StoreSettings>>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: Cache::builder()
                .max_capacity(1000)
                .time_to_live(CATALOG_TTL)
                .build(),
            settings: Cache::builder()
                .max_capacity(1)
                .time_to_live(SETTINGS_TTL)
                .build(),
        }
    }

    /// All categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` on a cache miss whose query fails.
    pub async fn categories(&self, pool: &PgPool) -> Result<Arc<Vec<Category>>, RepositoryError> {
        let key = "categories".to_owned();
        if let Some(CacheValue::Categories(categories)) = self.catalog.get(&key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = Arc::new(CatalogRepository::new(pool).list_categories().await?);
        self.catalog
            .insert(key, CacheValue::Categories(Arc::clone(&categories)))
            .await;
        Ok(categories)
    }

    /// Product page by slug. Missing products are not cached.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` on a cache miss whose query fails.
    pub async fn product(
        &self,
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<Arc<ProductDetail>>, RepositoryError> {
        let key = format!("product:{slug}");
        if let Some(CacheValue::Product(product)) = self.catalog.get(&key).await {
            debug!(slug, "Cache hit for product");
            return Ok(Some(product));
        }

        let Some(product) = CatalogRepository::new(pool).get_product_by_slug(slug).await? else {
            return Ok(None);
        };
        let product = Arc::new(product);
        self.catalog
            .insert(key, CacheValue::Product(Arc::clone(&product)))
            .await;
        Ok(Some(product))
    }

    /// Current store settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` on a cache miss whose query fails.
    pub async fn settings(&self, pool: &PgPool) -> Result<Arc<StoreSettings>, RepositoryError> {
        if let Some(settings) = self.settings.get(&()).await {
            return Ok(settings);
        }

        let settings = Arc::new(SettingsRepository::new(pool).get().await?);
        self.settings.insert((), Arc::clone(&settings)).await;
        Ok(settings)
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.catalog.invalidate_all();
        self.settings.invalidate_all();
        self.catalog.run_pending_tasks().await;
        self.settings.run_pending_tasks().await;
    }
}

impl std::fmt::Debug for CatalogCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCache")
            .field("catalog_entries", &self.catalog.entry_count())
            .field("settings_entries", &self.settings.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalidate_all_empties_cache() {
        let cache = CatalogCache::new();
        cache
            .catalog
            .insert(
                "categories".to_owned(),
                CacheValue::Categories(Arc::new(Vec::new())),
            )
            .await;
        cache.settings.insert((), Arc::new(StoreSettings::default())).await;
        assert!(cache.catalog.get("categories").await.is_some());

        cache.invalidate_all().await;

        assert!(cache.catalog.get("categories").await.is_none());
        assert!(cache.settings.get(&()).await.is_none());
    }
}
