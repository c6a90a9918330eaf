//! Public catalog routes.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

use kedai_core::{PageRequest, Paginated};
use rust_decimal::Decimal;

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::models::{Category, ProductDetail, ProductFilter, ProductSort, ProductSummary};
use crate::state::AppState;

/// Query string of `GET /api/products`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort: ProductSort,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl ProductQuery {
    fn split(self) -> std::result::Result<(ProductFilter, PageRequest), AppError> {
        if self.min_price.is_some_and(|p| p.is_sign_negative())
            || self.max_price.is_some_and(|p| p.is_sign_negative())
        {
            return Err(AppError::BadRequest("prices cannot be negative".to_string()));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price)
            && min > max
        {
            return Err(AppError::BadRequest(
                "min_price cannot exceed max_price".to_string(),
            ));
        }
        let page = PageRequest::new(self.page.unwrap_or(1), self.per_page.unwrap_or(20));
        let filter = ProductFilter {
            category: self.category,
            q: self.q,
            min_price: self.min_price,
            max_price: self.max_price,
            sort: self.sort,
        };
        Ok((filter, page))
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryList {
    pub categories: Arc<Vec<Category>>,
}

/// `GET /api/categories`
pub async fn categories(State(state): State<AppState>) -> Result<Json<CategoryList>> {
    let categories = state.cache().categories(state.pool()).await?;
    Ok(Json(CategoryList { categories }))
}

/// `GET /api/products`
#[instrument(skip(state))]
pub async fn products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Paginated<ProductSummary>>> {
    let (filter, page) = query.split()?;
    let listing = CatalogRepository::new(state.pool())
        .list_products(&filter, page)
        .await?;
    Ok(Json(listing))
}

/// `GET /api/products/{slug}`
#[instrument(skip(state))]
pub async fn product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Arc<ProductDetail>>> {
    state
        .cache()
        .product(state.pool(), &slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let (filter, page) = ProductQuery::default().split().unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 20);
        assert_eq!(filter.sort, ProductSort::Newest);
    }

    #[test]
    fn test_query_rejects_inverted_range() {
        let query = ProductQuery {
            min_price: Some(Decimal::new(50, 0)),
            max_price: Some(Decimal::new(10, 0)),
            ..ProductQuery::default()
        };
        assert!(matches!(query.split(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_query_rejects_negative_price() {
        let query = ProductQuery {
            min_price: Some(Decimal::new(-1, 0)),
            ..ProductQuery::default()
        };
        assert!(query.split().is_err());
    }

    #[test]
    fn test_query_clamps_page_size() {
        let query = ProductQuery {
            per_page: Some(10_000),
            ..ProductQuery::default()
        };
        let (_, page) = query.split().unwrap();
        assert_eq!(page.per_page, PageRequest::MAX_PER_PAGE);
    }
}
