//! Store settings (read-only on the storefront).

use sqlx::PgPool;
use sqlx::types::Json;

use kedai_core::StoreSettings;

use super::RepositoryError;

/// Repository for reading store settings.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new settings repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Current settings, or defaults if none were ever saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored JSON is invalid.
    pub async fn get(&self) -> Result<StoreSettings, RepositoryError> {
        let value = sqlx::query_scalar::<_, Json<serde_json::Value>>(
            "SELECT value FROM store_settings WHERE key = $1",
        )
        .bind(StoreSettings::KEY)
        .fetch_optional(self.pool)
        .await?;

        match value {
            None => Ok(StoreSettings::default()),
            Some(Json(value)) => serde_json::from_value(value)
                .map_err(|e| RepositoryError::DataCorruption(format!("store settings: {e}"))),
        }
    }
}
