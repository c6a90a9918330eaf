//! Supabase Storage client for product images.
//!
//! Objects are written with the service-role key and served from the
//! bucket's public URL, so the storefront never needs storage credentials.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::instrument;

use crate::config::StorageConfig;

/// Errors that can occur when talking to Supabase Storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Storage returned an error response.
    #[error("Storage error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Client could not be configured.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Supabase Storage client bound to one bucket.
#[derive(Clone)]
pub struct StorageClient {
    inner: Arc<StorageClientInner>,
}

struct StorageClientInner {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl StorageClient {
    /// Create a new storage client.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.service_role_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| StorageError::Config(format!("Invalid service key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("Authorization", auth);

        let mut apikey = HeaderValue::from_str(config.service_role_key.expose_secret())
            .map_err(|e| StorageError::Config(format!("Invalid service key format: {e}")))?;
        apikey.set_sensitive(true);
        headers.insert("apikey", apikey);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            inner: Arc::new(StorageClientInner {
                client,
                base_url: config.supabase_url.trim_end_matches('/').to_owned(),
                bucket: config.bucket.clone(),
            }),
        })
    }

    /// Upload an object, returning its public URL.
    ///
    /// # Errors
    ///
    /// Returns error if the upload request fails.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let response = self
            .inner
            .client
            .post(self.object_url(path))
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;

        check(response).await?;
        Ok(self.public_url(path))
    }

    /// Delete an object. Missing objects are not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the delete request fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let response = self
            .inner
            .client
            .delete(self.object_url(path))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await
    }

    /// Public URL of an object in the bucket.
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{path}",
            self.inner.base_url, self.inner.bucket
        )
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{path}",
            self.inner.base_url, self.inner.bucket
        )
    }
}

async fn check(response: reqwest::Response) -> Result<(), StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("base_url", &self.inner.base_url)
            .field("bucket", &self.inner.bucket)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> StorageClient {
        StorageClient::new(&StorageConfig {
            supabase_url: "https://abc.supabase.co/".to_owned(),
            service_role_key: "service-key".to_owned().into(),
            bucket: "product-images".to_owned(),
        })
        .unwrap()
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            client().public_url("products/p1/a.png"),
            "https://abc.supabase.co/storage/v1/object/public/product-images/products/p1/a.png"
        );
    }

    #[test]
    fn test_object_url() {
        assert_eq!(
            client().object_url("products/p1/a.png"),
            "https://abc.supabase.co/storage/v1/object/product-images/products/p1/a.png"
        );
    }
}
