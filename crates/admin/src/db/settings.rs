//! Store settings, stored as one JSON document.

use sqlx::PgPool;
use sqlx::types::Json;

use kedai_core::{ProfileId, StoreSettings};

use super::RepositoryError;

/// Repository for store settings.
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

    /// Replace the settings document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn put(
        &self,
        settings: &StoreSettings,
        updated_by: ProfileId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO store_settings (key, value, updated_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (key)
            DO UPDATE SET value = EXCLUDED.value,
                          updated_by = EXCLUDED.updated_by,
                          updated_at = now()
            ",
        )
        .bind(StoreSettings::KEY)
        .bind(Json(settings))
        .bind(updated_by)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
