//! Product image upload and gallery management.
//!
//! Objects live in Supabase Storage under `products/{product_id}/{uuid}.{ext}`;
//! `product_images` holds the public URL and gallery order. Uploads happen
//! before the row is written, and a failed insert removes the object again.

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use kedai_core::{ProductId, ProductImageId};

use crate::db::images::NewImage;
use crate::db::{ImageRepository, ProductRepository, RepositoryError};
use crate::models::ProductImage;
use crate::storage::{StorageClient, StorageError};

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const MAX_ALT_TEXT_LENGTH: usize = 300;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("image exceeds {} MiB", MAX_IMAGE_BYTES / 1024 / 1024)]
    TooLarge,

    #[error("image is empty")]
    Empty,

    #[error("file content does not match {0}")]
    ContentMismatch(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Accepted image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    /// Parse a declared MIME type.
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    /// Whether `bytes` start with this format's signature.
    #[must_use]
    pub fn matches(self, bytes: &[u8]) -> bool {
        match self {
            Self::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            Self::Png => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
            Self::Webp => bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
            Self::Gif => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        }
    }
}

/// A file received from a multipart form.
#[derive(Debug)]
pub struct Upload {
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub alt_text: Option<String>,
    pub is_primary: bool,
}

/// Check an upload and return its format.
///
/// # Errors
///
/// Returns an `ImageError` for empty, oversized, unsupported or mislabeled files.
pub fn validate_upload(upload: &Upload) -> Result<ImageFormat, ImageError> {
    if upload.bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if upload.bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge);
    }
    let format = ImageFormat::from_content_type(&upload.content_type)
        .ok_or_else(|| ImageError::UnsupportedType(upload.content_type.clone()))?;
    if !format.matches(&upload.bytes) {
        return Err(ImageError::ContentMismatch(format.content_type()));
    }
    if let Some(alt) = &upload.alt_text
        && alt.chars().count() > MAX_ALT_TEXT_LENGTH
    {
        return Err(ImageError::Validation(format!(
            "alt text must be at most {MAX_ALT_TEXT_LENGTH} characters"
        )));
    }
    Ok(format)
}

/// Object path for a new image.
#[must_use]
pub fn storage_path(product_id: ProductId, format: ImageFormat) -> String {
    format!(
        "products/{product_id}/{}.{}",
        Uuid::new_v4(),
        format.extension()
    )
}

fn not_found(err: RepositoryError) -> ImageError {
    match err {
        RepositoryError::NotFound => ImageError::NotFound,
        other => other.into(),
    }
}

/// Product image service.
pub struct ImageService<'a> {
    pool: &'a PgPool,
    storage: &'a StorageClient,
}

impl<'a> ImageService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, storage: &'a StorageClient) -> Self {
        Self { pool, storage }
    }

    /// Validate, upload and record an image.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::NotFound` if the product does not exist, a
    /// validation error for bad files, or `ImageError::Storage` if the upload
    /// fails.
    #[tracing::instrument(skip(self, upload), fields(size = upload.bytes.len()))]
    pub async fn upload(
        &self,
        product_id: ProductId,
        upload: Upload,
    ) -> Result<ProductImage, ImageError> {
        let format = validate_upload(&upload)?;

        if ProductRepository::new(self.pool)
            .get(product_id)
            .await?
            .is_none()
        {
            return Err(ImageError::NotFound);
        }

        let path = storage_path(product_id, format);
        let url = self
            .storage
            .upload(&path, format.content_type(), upload.bytes)
            .await?;

        let image = NewImage {
            storage_path: path.clone(),
            url,
            alt_text: upload
                .alt_text
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty()),
            is_primary: upload.is_primary,
        };

        match ImageRepository::new(self.pool).create(product_id, &image).await {
            Ok(image) => {
                tracing::info!(image_id = %image.id, %path, "Product image uploaded");
                Ok(image)
            }
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&path).await {
                    tracing::warn!(%path, error = %cleanup, "Failed to remove orphaned image object");
                }
                Err(not_found(e))
            }
        }
    }

    /// # Errors
    ///
    /// Returns `ImageError::NotFound` if the image does not exist.
    pub async fn set_primary(&self, id: ProductImageId) -> Result<ProductImage, ImageError> {
        ImageRepository::new(self.pool)
            .set_primary(id)
            .await
            .map_err(not_found)
    }

    /// Delete the row, then the object. A failed object delete is logged only.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::NotFound` if the image does not exist.
    pub async fn delete(&self, id: ProductImageId) -> Result<(), ImageError> {
        let image = ImageRepository::new(self.pool)
            .delete(id)
            .await
            .map_err(not_found)?;

        if let Err(e) = self.storage.delete(&image.storage_path).await {
            tracing::warn!(path = %image.storage_path, error = %e, "Failed to delete image object");
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` unless `ids` lists exactly the
    /// product's images.
    pub async fn reorder(
        &self,
        product_id: ProductId,
        ids: &[ProductImageId],
    ) -> Result<Vec<ProductImage>, ImageError> {
        ImageRepository::new(self.pool)
            .reorder(product_id, ids)
            .await
            .map_err(not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn upload(content_type: &str, bytes: &[u8]) -> Upload {
        Upload {
            content_type: content_type.to_owned(),
            bytes: bytes.to_vec(),
            alt_text: None,
            is_primary: false,
        }
    }

    #[test]
    fn test_content_type_parsing() {
        assert_eq!(
            ImageFormat::from_content_type("IMAGE/PNG; charset=binary"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_content_type("image/jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_content_type("image/svg+xml"), None);
    }

    #[test]
    fn test_validate_upload() {
        assert!(matches!(validate_upload(&upload("image/png", PNG)), Ok(ImageFormat::Png)));
        assert!(matches!(
            validate_upload(&upload("image/svg+xml", b"<svg/>")),
            Err(ImageError::UnsupportedType(_))
        ));
        assert!(matches!(
            validate_upload(&upload("image/jpeg", PNG)),
            Err(ImageError::ContentMismatch("image/jpeg"))
        ));
        assert!(matches!(validate_upload(&upload("image/png", b"")), Err(ImageError::Empty)));
    }

    #[test]
    fn test_rejects_oversized_upload() {
        let mut bytes = PNG.to_vec();
        bytes.resize(MAX_IMAGE_BYTES + 1, 0);
        assert!(matches!(
            validate_upload(&upload("image/png", &bytes)),
            Err(ImageError::TooLarge)
        ));
    }

    #[test]
    fn test_webp_signature() {
        assert!(ImageFormat::Webp.matches(b"RIFF\x10\0\0\0WEBPVP8 "));
        assert!(!ImageFormat::Webp.matches(b"RIFF\x10\0\0\0WAVE"));
    }

    #[test]
    fn test_storage_path_layout() {
        let product_id = ProductId::generate();
        let path = storage_path(product_id, ImageFormat::Webp);
        let prefix = format!("products/{product_id}/");
        assert!(path.starts_with(&prefix));
        assert!(path.ends_with(".webp"));
        let stem = &path[prefix.len()..path.len() - ".webp".len()];
        assert!(Uuid::parse_str(stem).is_ok());
    }
}
