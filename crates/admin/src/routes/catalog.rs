//! Category, product, variant and stock management.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use kedai_core::{CategoryId, PageRequest, Paginated, ProductId, VariantId};

use crate::db::products::{DeleteOutcome, ProductListFilter};
use crate::db::{CategoryRepository, ProductRepository, SettingsRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireStaff;
use crate::models::{AdminCategory, AdminProduct, AdminProductSummary, AdminVariant, LowStockVariant};
use crate::services::catalog::{
    CategoryPatch, NewCategory, NewProduct, NewVariant, ProductPatch, VariantPatch,
};
use crate::state::AppState;

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CategoryList {
    pub categories: Vec<AdminCategory>,
}

/// `GET /api/categories`
pub async fn list_categories(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<CategoryList>> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(Json(CategoryList { categories }))
}

/// `POST /api/categories`
#[instrument(skip_all)]
pub async fn create_category(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Json(body): Json<NewCategory>,
) -> Result<(StatusCode, Json<AdminCategory>)> {
    let category = state.catalog().create_category(body).await?;
    tracing::info!(category_id = %category.id, by = %staff.profile_id, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// `PATCH /api/categories/{id}`
#[instrument(skip(state, body))]
pub async fn update_category(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryPatch>,
) -> Result<Json<AdminCategory>> {
    Ok(Json(state.catalog().update_category(id, body).await?))
}

/// `DELETE /api/categories/{id}`
#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    state.catalog().delete_category(id).await?;
    tracing::info!(category_id = %id, by = %staff.profile_id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Products
// =============================================================================

/// Query string of `GET /api/products`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub category_id: Option<CategoryId>,
    pub active: Option<bool>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

/// `GET /api/products`
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paginated<AdminProductSummary>>> {
    let page = PageRequest::new(query.page.unwrap_or(1), query.per_page.unwrap_or(20));
    let filter = ProductListFilter {
        q: query.q,
        category_id: query.category_id,
        active: query.active,
    };
    let listing = ProductRepository::new(state.pool())
        .list(&filter, page)
        .await?;
    Ok(Json(listing))
}

/// `GET /api/products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ProductId>,
) -> Result<Json<AdminProduct>> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// `POST /api/products`
#[instrument(skip_all)]
pub async fn create_product(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<AdminProduct>)> {
    let product = state.catalog().create_product(body).await?;
    tracing::info!(product_id = %product.id, by = %staff.profile_id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PATCH /api/products/{id}`
#[instrument(skip(state, body))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductPatch>,
) -> Result<Json<AdminProduct>> {
    Ok(Json(state.catalog().update_product(id, body).await?))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub outcome: DeleteOutcome,
}

/// `DELETE /api/products/{id}`
///
/// Products that appear on orders are archived instead of deleted; the
/// response says which happened.
#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<ProductId>,
) -> Result<Json<DeleteResponse>> {
    let outcome = state.catalog().delete_product(id).await?;
    tracing::info!(product_id = %id, ?outcome, by = %staff.profile_id, "Product removed");
    Ok(Json(DeleteResponse { outcome }))
}

// =============================================================================
// Variants & stock
// =============================================================================

/// `POST /api/products/{id}/variants`
#[instrument(skip(state, body))]
pub async fn create_variant(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<ProductId>,
    Json(body): Json<NewVariant>,
) -> Result<(StatusCode, Json<AdminVariant>)> {
    let variant = state.catalog().create_variant(id, body).await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

/// `PATCH /api/variants/{id}`
#[instrument(skip(state, body))]
pub async fn update_variant(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<VariantId>,
    Json(body): Json<VariantPatch>,
) -> Result<Json<AdminVariant>> {
    Ok(Json(state.catalog().update_variant(id, body).await?))
}

/// `DELETE /api/variants/{id}`
#[instrument(skip(state))]
pub async fn delete_variant(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
    Path(id): Path<VariantId>,
) -> Result<StatusCode> {
    state.catalog().delete_variant(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i32,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct StockLevel {
    pub variant_id: VariantId,
    pub stock_quantity: i32,
}

/// `POST /api/variants/{id}/stock`
#[instrument(skip(state))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<VariantId>,
    Json(body): Json<AdjustStockRequest>,
) -> Result<Json<StockLevel>> {
    let stock_quantity = state.catalog().adjust_stock(id, body.delta).await?;
    tracing::info!(
        variant_id = %id,
        delta = body.delta,
        stock_quantity,
        by = %staff.profile_id,
        "Stock adjusted"
    );
    Ok(Json(StockLevel {
        variant_id: id,
        stock_quantity,
    }))
}

/// `PUT /api/variants/{id}/stock`
#[instrument(skip(state))]
pub async fn set_stock(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(id): Path<VariantId>,
    Json(body): Json<SetStockRequest>,
) -> Result<Json<StockLevel>> {
    let stock_quantity = state.catalog().set_stock(id, body.quantity).await?;
    tracing::info!(variant_id = %id, stock_quantity, by = %staff.profile_id, "Stock set");
    Ok(Json(StockLevel {
        variant_id: id,
        stock_quantity,
    }))
}

#[derive(Debug, Serialize)]
pub struct LowStockReport {
    pub threshold: i32,
    pub variants: Vec<LowStockVariant>,
}

/// `GET /api/inventory/low-stock`
pub async fn low_stock(
    State(state): State<AppState>,
    RequireStaff(_): RequireStaff,
) -> Result<Json<LowStockReport>> {
    let threshold = SettingsRepository::new(state.pool())
        .get()
        .await?
        .low_stock_threshold;
    let variants = ProductRepository::new(state.pool())
        .low_stock(threshold)
        .await?;
    Ok(Json(LowStockReport {
        threshold,
        variants,
    }))
}
