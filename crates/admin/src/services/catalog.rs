//! Catalog management: categories, products, variants and stock.
//!
//! Handlers deserialize into the input types here; the service validates,
//! merges partial updates onto the stored row and writes the complete row.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use sqlx::PgPool;
use thiserror::Error;

use kedai_core::{CategoryId, ProductId, Slug, SlugError, VariantId};

use crate::db::categories::CategoryFields;
use crate::db::products::{DeleteOutcome, ProductFields, VariantFields};
use crate::db::{CategoryRepository, ProductRepository, RepositoryError, SettingsRepository};
use crate::models::{AdminCategory, AdminProduct, AdminVariant};
use crate::storage::StorageClient;

const MAX_NAME_LENGTH: usize = 200;
const MAX_SKU_LENGTH: usize = 64;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid slug: {0}")]
    Slug(#[from] SlugError),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CatalogError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Distinguish an absent field from an explicit `null` in PATCH bodies.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent_id: Option<Option<CategoryId>>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub base_price: Decimal,
    pub weight_grams: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<CategoryId>>,
    pub base_price: Option<Decimal>,
    #[serde(default, deserialize_with = "nullable")]
    pub weight_grams: Option<Option<i32>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVariant {
    pub sku: String,
    pub name: String,
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stock_quantity: i32,
    pub weight_grams: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub price: Option<Option<Decimal>>,
    pub stock_quantity: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub weight_grams: Option<Option<i32>>,
    pub is_active: Option<bool>,
}

const fn default_true() -> bool {
    true
}

// =============================================================================
// Validation
// =============================================================================

fn clean_name(name: &str, what: &str) -> Result<String, CatalogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::invalid(format!("{what} cannot be empty")));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CatalogError::invalid(format!(
            "{what} must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_owned())
}

/// Explicit slug if given, otherwise derived from the name.
fn resolve_slug(explicit: Option<&str>, name: &str) -> Result<String, CatalogError> {
    let slug = match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => Slug::parse(slug)?,
        None => Slug::from_title(name)?,
    };
    Ok(slug.as_str().to_owned())
}

fn clean_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty())
}

fn check_price(price: Decimal, what: &str) -> Result<(), CatalogError> {
    if price.is_sign_negative() {
        return Err(CatalogError::invalid(format!("{what} cannot be negative")));
    }
    if price.scale() > 2 {
        return Err(CatalogError::invalid(format!(
            "{what} cannot have more than two decimal places"
        )));
    }
    Ok(())
}

fn check_weight(weight_grams: Option<i32>) -> Result<(), CatalogError> {
    match weight_grams {
        Some(w) if w < 0 => Err(CatalogError::invalid("weight cannot be negative")),
        _ => Ok(()),
    }
}

fn check_stock(quantity: i32) -> Result<(), CatalogError> {
    if quantity < 0 {
        return Err(CatalogError::invalid("stock quantity cannot be negative"));
    }
    Ok(())
}

fn clean_sku(sku: &str) -> Result<String, CatalogError> {
    let sku = sku.trim();
    if sku.is_empty() {
        return Err(CatalogError::invalid("SKU cannot be empty"));
    }
    if sku.len() > MAX_SKU_LENGTH || sku.chars().any(char::is_whitespace) {
        return Err(CatalogError::invalid(format!(
            "SKU must be at most {MAX_SKU_LENGTH} characters without spaces"
        )));
    }
    Ok(sku.to_owned())
}

fn category_fields(input: NewCategory) -> Result<CategoryFields, CatalogError> {
    let name = clean_name(&input.name, "category name")?;
    Ok(CategoryFields {
        slug: resolve_slug(input.slug.as_deref(), &name)?,
        name,
        description: clean_text(input.description),
        parent_id: input.parent_id,
        sort_order: input.sort_order,
    })
}

fn merge_category(current: AdminCategory, patch: CategoryPatch) -> Result<CategoryFields, CatalogError> {
    let name = match patch.name {
        Some(name) => clean_name(&name, "category name")?,
        None => current.name,
    };
    let slug = match patch.slug {
        Some(slug) => resolve_slug(Some(&slug), &name)?,
        None => current.slug,
    };
    Ok(CategoryFields {
        name,
        slug,
        description: patch
            .description
            .map_or(current.description, clean_text),
        parent_id: patch.parent_id.unwrap_or(current.parent_id),
        sort_order: patch.sort_order.unwrap_or(current.sort_order),
    })
}

fn product_fields(input: NewProduct) -> Result<ProductFields, CatalogError> {
    let name = clean_name(&input.name, "product name")?;
    check_price(input.base_price, "base price")?;
    check_weight(input.weight_grams)?;
    Ok(ProductFields {
        slug: resolve_slug(input.slug.as_deref(), &name)?,
        name,
        description: clean_text(input.description),
        category_id: input.category_id,
        base_price: input.base_price,
        weight_grams: input.weight_grams,
        is_active: input.is_active,
        is_featured: input.is_featured,
    })
}

fn merge_product(current: AdminProduct, patch: ProductPatch) -> Result<ProductFields, CatalogError> {
    let name = match patch.name {
        Some(name) => clean_name(&name, "product name")?,
        None => current.name,
    };
    let slug = match patch.slug {
        Some(slug) => resolve_slug(Some(&slug), &name)?,
        None => current.slug,
    };
    let base_price = patch.base_price.unwrap_or(current.base_price);
    check_price(base_price, "base price")?;
    let weight_grams = patch.weight_grams.unwrap_or(current.weight_grams);
    check_weight(weight_grams)?;

    Ok(ProductFields {
        name,
        slug,
        description: patch
            .description
            .map_or(current.description, clean_text),
        category_id: patch.category_id.unwrap_or(current.category_id),
        base_price,
        weight_grams,
        is_active: patch.is_active.unwrap_or(current.is_active),
        is_featured: patch.is_featured.unwrap_or(current.is_featured),
    })
}

fn variant_fields(input: NewVariant) -> Result<VariantFields, CatalogError> {
    if let Some(price) = input.price {
        check_price(price, "variant price")?;
    }
    check_stock(input.stock_quantity)?;
    check_weight(input.weight_grams)?;
    Ok(VariantFields {
        sku: clean_sku(&input.sku)?,
        name: clean_name(&input.name, "variant name")?,
        price: input.price,
        stock_quantity: input.stock_quantity,
        weight_grams: input.weight_grams,
        is_active: input.is_active,
    })
}

fn merge_variant(current: AdminVariant, patch: VariantPatch) -> Result<VariantFields, CatalogError> {
    let price = patch.price.unwrap_or(current.price);
    if let Some(price) = price {
        check_price(price, "variant price")?;
    }
    let stock_quantity = patch.stock_quantity.unwrap_or(current.stock_quantity);
    check_stock(stock_quantity)?;
    let weight_grams = patch.weight_grams.unwrap_or(current.weight_grams);
    check_weight(weight_grams)?;

    Ok(VariantFields {
        sku: match patch.sku {
            Some(sku) => clean_sku(&sku)?,
            None => current.sku,
        },
        name: match patch.name {
            Some(name) => clean_name(&name, "variant name")?,
            None => current.name,
        },
        price,
        stock_quantity,
        weight_grams,
        is_active: patch.is_active.unwrap_or(current.is_active),
    })
}

fn not_found(err: RepositoryError) -> CatalogError {
    match err {
        RepositoryError::NotFound => CatalogError::NotFound,
        other => other.into(),
    }
}

// =============================================================================
// Service
// =============================================================================

/// Catalog write operations.
pub struct CatalogService<'a> {
    pool: &'a PgPool,
    storage: &'a StorageClient,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, storage: &'a StorageClient) -> Self {
        Self { pool, storage }
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for bad input and
    /// `RepositoryError::Conflict` for a duplicate slug or unknown parent.
    pub async fn create_category(&self, input: NewCategory) -> Result<AdminCategory, CatalogError> {
        let fields = category_fields(input)?;
        Ok(CategoryRepository::new(self.pool).create(&fields).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Validation` if the new parent would make the
    /// category its own ancestor.
    pub async fn update_category(
        &self,
        id: CategoryId,
        patch: CategoryPatch,
    ) -> Result<AdminCategory, CatalogError> {
        let categories = CategoryRepository::new(self.pool);
        let current = categories.get(id).await?.ok_or(CatalogError::NotFound)?;
        let fields = merge_category(current, patch)?;

        if let Some(parent_id) = fields.parent_id
            && (parent_id == id || categories.would_cycle(id, parent_id).await?)
        {
            return Err(CatalogError::invalid(
                "a category cannot be its own parent or ancestor",
            ));
        }

        categories.update(id, &fields).await.map_err(not_found)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while products reference the category.
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), CatalogError> {
        CategoryRepository::new(self.pool)
            .delete(id)
            .await
            .map_err(not_found)
    }

    /// Create a product priced in the store currency.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for bad input and
    /// `RepositoryError::Conflict` for a duplicate slug.
    pub async fn create_product(&self, input: NewProduct) -> Result<AdminProduct, CatalogError> {
        let fields = product_fields(input)?;
        let currency = SettingsRepository::new(self.pool).get().await?.currency;

        let products = ProductRepository::new(self.pool);
        let id = products.create(&fields, currency).await?;
        tracing::info!(product_id = %id, slug = %fields.slug, "Product created");

        products.get(id).await?.ok_or(CatalogError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist.
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<AdminProduct, CatalogError> {
        let products = ProductRepository::new(self.pool);
        let current = products.get(id).await?.ok_or(CatalogError::NotFound)?;
        let fields = merge_product(current, patch)?;

        products.update(id, &fields).await.map_err(not_found)?;
        products.get(id).await?.ok_or(CatalogError::NotFound)
    }

    /// Delete a product, archiving it instead when orders reference it.
    ///
    /// Storage objects of deleted images are removed best-effort.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist.
    pub async fn delete_product(&self, id: ProductId) -> Result<DeleteOutcome, CatalogError> {
        let (outcome, paths) = ProductRepository::new(self.pool)
            .delete_or_archive(id)
            .await
            .map_err(not_found)?;

        for path in &paths {
            if let Err(e) = self.storage.delete(path).await {
                tracing::warn!(%path, error = %e, "Failed to delete product image object");
            }
        }

        tracing::info!(product_id = %id, ?outcome, "Product removed");
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a duplicate SKU or unknown product.
    pub async fn create_variant(
        &self,
        product_id: ProductId,
        input: NewVariant,
    ) -> Result<AdminVariant, CatalogError> {
        let fields = variant_fields(input)?;
        let products = ProductRepository::new(self.pool);
        if products.get(product_id).await?.is_none() {
            return Err(CatalogError::NotFound);
        }
        Ok(products.create_variant(product_id, &fields).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the variant does not exist.
    pub async fn update_variant(
        &self,
        id: VariantId,
        patch: VariantPatch,
    ) -> Result<AdminVariant, CatalogError> {
        let products = ProductRepository::new(self.pool);
        let current = products
            .get_variant(id)
            .await?
            .ok_or(CatalogError::NotFound)?;
        let fields = merge_variant(current, patch)?;

        products.update_variant(id, &fields).await.map_err(not_found)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the variant does not exist.
    pub async fn delete_variant(&self, id: VariantId) -> Result<(), CatalogError> {
        ProductRepository::new(self.pool)
            .delete_variant(id)
            .await
            .map_err(not_found)
    }

    /// Atomically add `delta` to a variant's stock. Returns the new quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if stock would go negative.
    pub async fn adjust_stock(&self, id: VariantId, delta: i32) -> Result<i32, CatalogError> {
        if delta == 0 {
            return Err(CatalogError::invalid("delta cannot be zero"));
        }
        let quantity = ProductRepository::new(self.pool)
            .adjust_stock(id, delta)
            .await
            .map_err(not_found)?;
        tracing::info!(variant_id = %id, delta, quantity, "Stock adjusted");
        Ok(quantity)
    }

    /// Set a variant's stock. Returns the new quantity.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for a negative quantity.
    pub async fn set_stock(&self, id: VariantId, quantity: i32) -> Result<i32, CatalogError> {
        check_stock(quantity)?;
        let quantity = ProductRepository::new(self.pool)
            .set_stock(id, quantity)
            .await
            .map_err(not_found)?;
        tracing::info!(variant_id = %id, quantity, "Stock set");
        Ok(quantity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use kedai_core::CurrencyCode;

    use super::*;

    fn product() -> AdminProduct {
        AdminProduct {
            id: ProductId::generate(),
            name: "Kopi Kampung".to_owned(),
            slug: "kopi-kampung".to_owned(),
            description: Some("Dark roast".to_owned()),
            category_id: Some(CategoryId::generate()),
            base_price: Decimal::new(2490, 2),
            currency: CurrencyCode::MYR,
            weight_grams: Some(500),
            is_active: true,
            is_featured: false,
            variants: Vec::new(),
            images: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_slug_derived_from_name() {
        let fields = product_fields(NewProduct {
            name: "  Teh Tarik Premix 1kg ".to_owned(),
            slug: None,
            description: Some("   ".to_owned()),
            category_id: None,
            base_price: Decimal::new(1500, 2),
            weight_grams: None,
            is_active: true,
            is_featured: false,
        })
        .unwrap();
        assert_eq!(fields.name, "Teh Tarik Premix 1kg");
        assert_eq!(fields.slug, "teh-tarik-premix-1kg");
        assert_eq!(fields.description, None);
    }

    #[test]
    fn test_explicit_slug_is_validated() {
        assert!(matches!(
            resolve_slug(Some("Not A Slug"), "x"),
            Err(CatalogError::Slug(_))
        ));
        assert_eq!(resolve_slug(Some("ok-slug"), "x").unwrap(), "ok-slug");
    }

    #[test]
    fn test_price_rules() {
        assert!(check_price(Decimal::new(-1, 2), "price").is_err());
        assert!(check_price(Decimal::new(1001, 3), "price").is_err());
        assert!(check_price(Decimal::ZERO, "price").is_ok());
    }

    #[test]
    fn test_patch_keeps_absent_fields_and_clears_nulls() {
        let patch: ProductPatch =
            serde_json::from_str(r#"{"category_id": null, "base_price": "19.90"}"#).unwrap();
        let current = product();
        let fields = merge_product(current.clone(), patch).unwrap();

        assert_eq!(fields.name, current.name);
        assert_eq!(fields.description, current.description);
        assert_eq!(fields.category_id, None);
        assert_eq!(fields.base_price, Decimal::new(1990, 2));
        assert_eq!(fields.weight_grams, Some(500));
    }

    #[test]
    fn test_renaming_keeps_slug() {
        let patch = ProductPatch {
            name: Some("Kopi Kampung Extra".to_owned()),
            ..ProductPatch::default()
        };
        let fields = merge_product(product(), patch).unwrap();
        assert_eq!(fields.slug, "kopi-kampung");
    }

    #[test]
    fn test_variant_validation() {
        let input = NewVariant {
            sku: "KOPI 500".to_owned(),
            name: "500g".to_owned(),
            price: None,
            stock_quantity: 3,
            weight_grams: None,
            is_active: true,
        };
        assert!(matches!(
            variant_fields(input.clone()),
            Err(CatalogError::Validation(_))
        ));

        let negative = NewVariant {
            sku: "KOPI-500".to_owned(),
            stock_quantity: -1,
            ..input
        };
        assert!(variant_fields(negative).is_err());
    }
}
