//! Product image upload and management.

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use kedai_core::{ProductId, ProductImageId};

use crate::error::{AppError, Result};
use crate::middleware::RequireStaff;
use crate::models::ProductImage;
use crate::services::images::Upload;
use crate::state::AppState;

fn multipart_error(err: &MultipartError) -> AppError {
    AppError::BadRequest(err.body_text())
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim() {
        "true" | "1" | "on" => Ok(true),
        "" | "false" | "0" | "off" => Ok(false),
        other => Err(AppError::BadRequest(format!(
            "is_primary must be true or false, got {other:?}"
        ))),
    }
}

/// Collect the `file`, `alt_text` and `is_primary` fields of an upload form.
async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut alt_text = None;
    let mut is_primary = false;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        match field.name() {
            Some("file") => {
                let content_type = field
                    .content_type()
                    .map(str::to_owned)
                    .unwrap_or_default();
                let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
                file = Some((content_type, bytes.to_vec()));
            }
            Some("alt_text") => {
                let text = field.text().await.map_err(|e| multipart_error(&e))?;
                alt_text = Some(text);
            }
            Some("is_primary") => {
                let text = field.text().await.map_err(|e| multipart_error(&e))?;
                is_primary = parse_flag(&text)?;
            }
            _ => {}
        }
    }

    let (content_type, bytes) =
        file.ok_or_else(|| AppError::BadRequest("missing file field".to_string()))?;

    Ok(Upload {
        content_type,
        bytes,
        alt_text,
        is_primary,
    })
}

/// `POST /api/products/{id}/images`
#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProductImage>)> {
    let upload = read_upload(multipart).await?;
    let image = state.images().upload(id, upload).await?;
    tracing::info!(
        product_id = %id,
        image_id = %image.id,
        is_primary = image.is_primary,
        by = %staff.profile_id,
        "Product image uploaded"
    );
    Ok((StatusCode::CREATED, Json(image)))
}

/// `POST /api/images/{id}/primary`
#[instrument(skip(state))]
pub async fn set_primary(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ProductImageId>,
) -> Result<Json<ProductImage>> {
    Ok(Json(state.images().set_primary(id).await?))
}

/// `DELETE /api/images/{id}`
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ProductImageId>,
) -> Result<StatusCode> {
    state.images().delete(id).await?;
    tracing::info!(image_id = %id, by = %staff.profile_id, "Product image deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub image_ids: Vec<ProductImageId>,
}

#[derive(Debug, Serialize)]
pub struct ImageList {
    pub images: Vec<ProductImage>,
}

/// `PUT /api/products/{id}/images/order`
#[instrument(skip(state, body))]
pub async fn reorder(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ProductId>,
    Json(body): Json<ReorderRequest>,
) -> Result<Json<ImageList>> {
    let images = state.images().reorder(id, &body.image_ids).await?;
    Ok(Json(ImageList { images }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true").unwrap());
        assert!(parse_flag(" on ").unwrap());
        assert!(!parse_flag("").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("yes please").is_err());
    }
}
