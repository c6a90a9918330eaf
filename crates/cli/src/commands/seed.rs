//! Seed the catalog from a YAML file.
//!
//! Categories are upserted on `slug`, products on `slug` and variants on
//! `sku`, so the same file can be applied repeatedly. Products may name a
//! category from the file or one already in the database. Stock is only set
//! when a variant is first created; re-seeding never resets live stock.
//!
//! ```yaml
//! categories:
//!   - name: Coffee
//!     sort_order: 1
//!   - name: Single Origin
//!     parent: coffee
//! products:
//!   - name: Sumatra Mandheling
//!     category: single-origin
//!     base_price: "42.00"
//!     weight_grams: 250
//!     variants:
//!       - sku: SUM-250-WB
//!         name: 250 g whole bean
//!         stock_quantity: 40
//! ```

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use kedai_admin::db::SettingsRepository;
use kedai_core::{CategoryId, CurrencyCode, ProductId, Slug, SlugError};

use super::{ConnectError, connect};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid seed file: {0}")]
    Invalid(String),

    #[error("Invalid slug: {0}")]
    Slug(#[from] SlugError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Could not read store settings: {0}")]
    Settings(#[from] kedai_admin::db::RepositoryError),
}

/// Top-level seed document.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCategory {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    /// Slug of the parent category, which must appear earlier in the file.
    pub parent: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    pub base_price: Decimal,
    pub weight_grams: Option<i32>,
    #[serde(default = "active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub variants: Vec<SeedVariant>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedVariant {
    pub sku: String,
    pub name: String,
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stock_quantity: i32,
    pub weight_grams: Option<i32>,
}

const fn active() -> bool {
    true
}

/// Counts reported after seeding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub products: usize,
    pub variants: usize,
}

fn slug_for(explicit: Option<&str>, name: &str) -> Result<Slug, SlugError> {
    match explicit {
        Some(slug) => Slug::parse(slug),
        None => Slug::from_title(name),
    }
}

fn non_negative_price(value: Decimal, what: &str) -> Result<(), SeedError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(SeedError::Invalid(format!("{what} cannot be negative")));
    }
    if value.scale() > 2 {
        return Err(SeedError::Invalid(format!(
            "{what} has more than 2 decimal places"
        )));
    }
    Ok(())
}

impl SeedFile {
    /// Parse a seed document.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Yaml` for malformed YAML or unknown fields.
    pub fn parse(content: &str) -> Result<Self, SeedError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Check the whole file before touching the database.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), SeedError> {
        let mut categories = Vec::with_capacity(self.categories.len());
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(SeedError::Invalid("category name is required".to_owned()));
            }
            let slug = slug_for(category.slug.as_deref(), &category.name)?;
            if let Some(parent) = &category.parent
                && !categories.contains(parent)
            {
                return Err(SeedError::Invalid(format!(
                    "category {slug}: parent {parent} must be listed before it"
                )));
            }
            if categories.contains(&slug.as_str().to_owned()) {
                return Err(SeedError::Invalid(format!("duplicate category slug {slug}")));
            }
            categories.push(slug.as_str().to_owned());
        }

        let mut skus = Vec::new();
        for product in &self.products {
            if product.name.trim().is_empty() {
                return Err(SeedError::Invalid("product name is required".to_owned()));
            }
            let slug = slug_for(product.slug.as_deref(), &product.name)?;
            non_negative_price(product.base_price, &format!("{slug} base_price"))?;
            if product.variants.is_empty() {
                return Err(SeedError::Invalid(format!(
                    "product {slug} needs at least one variant"
                )));
            }
            for variant in &product.variants {
                let sku = variant.sku.trim();
                if sku.is_empty() || sku.chars().any(char::is_whitespace) {
                    return Err(SeedError::Invalid(format!(
                        "product {slug}: invalid sku {:?}",
                        variant.sku
                    )));
                }
                if skus.contains(&sku) {
                    return Err(SeedError::Invalid(format!("duplicate sku {sku}")));
                }
                skus.push(sku);
                if let Some(price) = variant.price {
                    non_negative_price(price, &format!("{sku} price"))?;
                }
                if variant.stock_quantity < 0 {
                    return Err(SeedError::Invalid(format!(
                        "{sku} stock_quantity cannot be negative"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Seed the catalog from a YAML file.
///
/// # Errors
///
/// Returns an error if the file is invalid or any write fails; nothing is
/// committed in that case.
pub async fn run(path: &Path) -> Result<SeedSummary, SeedError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: path.display().to_string(),
            source,
        })?;
    let file = SeedFile::parse(&content)?;
    file.validate()?;
    tracing::info!(
        categories = file.categories.len(),
        products = file.products.len(),
        "Seed file validated"
    );

    let pool = connect().await?;
    let summary = apply(&pool, &file).await?;

    tracing::info!(
        categories = summary.categories,
        products = summary.products,
        variants = summary.variants,
        "Seeding complete"
    );
    Ok(summary)
}

async fn apply(pool: &PgPool, file: &SeedFile) -> Result<SeedSummary, SeedError> {
    let currency = SettingsRepository::new(pool).get().await?.currency;

    let mut tx = pool.begin().await?;
    let mut summary = SeedSummary::default();
    let mut category_ids: HashMap<String, CategoryId> = HashMap::new();

    for category in &file.categories {
        let slug = slug_for(category.slug.as_deref(), &category.name)?;
        let parent_id = category
            .parent
            .as_ref()
            .and_then(|parent| category_ids.get(parent).copied());
        let id = upsert_category(&mut tx, category, &slug, parent_id).await?;
        category_ids.insert(slug.as_str().to_owned(), id);
        summary.categories += 1;
    }

    for product in &file.products {
        let slug = slug_for(product.slug.as_deref(), &product.name)?;
        let category_id = match &product.category {
            Some(category) => match category_ids.get(category) {
                Some(id) => Some(*id),
                None => Some(existing_category(&mut tx, category).await?.ok_or_else(|| {
                    SeedError::Invalid(format!("product {slug}: unknown category {category}"))
                })?),
            },
            None => None,
        };
        let product_id = upsert_product(&mut tx, product, &slug, category_id, currency).await?;
        summary.products += 1;

        for variant in &product.variants {
            upsert_variant(&mut tx, product_id, variant).await?;
            summary.variants += 1;
        }
    }

    tx.commit().await?;
    Ok(summary)
}

async fn existing_category(
    conn: &mut PgConnection,
    slug: &str,
) -> Result<Option<CategoryId>, SeedError> {
    Ok(
        sqlx::query_scalar::<_, CategoryId>("SELECT id FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(conn)
            .await?,
    )
}

async fn upsert_category(
    conn: &mut PgConnection,
    category: &SeedCategory,
    slug: &Slug,
    parent_id: Option<CategoryId>,
) -> Result<CategoryId, SeedError> {
    Ok(sqlx::query_scalar::<_, CategoryId>(
        r"
        INSERT INTO categories (name, slug, description, parent_id, sort_order)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (slug) DO UPDATE
        SET name = EXCLUDED.name,
            description = EXCLUDED.description,
            parent_id = EXCLUDED.parent_id,
            sort_order = EXCLUDED.sort_order,
            updated_at = now()
        RETURNING id
        ",
    )
    .bind(category.name.trim())
    .bind(slug.as_str())
    .bind(category.description.as_deref())
    .bind(parent_id)
    .bind(category.sort_order)
    .fetch_one(conn)
    .await?)
}

async fn upsert_product(
    conn: &mut PgConnection,
    product: &SeedProduct,
    slug: &Slug,
    category_id: Option<CategoryId>,
    currency: CurrencyCode,
) -> Result<ProductId, SeedError> {
    Ok(sqlx::query_scalar::<_, ProductId>(
        r"
        INSERT INTO products (name, slug, description, category_id, base_price, currency,
                              weight_grams, is_active, is_featured)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (slug) DO UPDATE
        SET name = EXCLUDED.name,
            description = EXCLUDED.description,
            category_id = EXCLUDED.category_id,
            base_price = EXCLUDED.base_price,
            weight_grams = EXCLUDED.weight_grams,
            is_active = EXCLUDED.is_active,
            is_featured = EXCLUDED.is_featured,
            updated_at = now()
        RETURNING id
        ",
    )
    .bind(product.name.trim())
    .bind(slug.as_str())
    .bind(product.description.as_deref())
    .bind(category_id)
    .bind(product.base_price)
    .bind(currency)
    .bind(product.weight_grams)
    .bind(product.is_active)
    .bind(product.is_featured)
    .fetch_one(conn)
    .await?)
}

async fn upsert_variant(
    conn: &mut PgConnection,
    product_id: ProductId,
    variant: &SeedVariant,
) -> Result<(), SeedError> {
    sqlx::query(
        r"
        INSERT INTO product_variants (product_id, sku, name, price, stock_quantity, weight_grams)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (sku) DO UPDATE
        SET product_id = EXCLUDED.product_id,
            name = EXCLUDED.name,
            price = EXCLUDED.price,
            weight_grams = EXCLUDED.weight_grams,
            updated_at = now()
        ",
    )
    .bind(product_id)
    .bind(variant.sku.trim())
    .bind(variant.name.trim())
    .bind(variant.price)
    .bind(variant.stock_quantity)
    .bind(variant.weight_grams)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
categories:
  - name: Coffee
    sort_order: 1
  - name: Single Origin
    parent: coffee
products:
  - name: Sumatra Mandheling
    category: single-origin
    base_price: "42.00"
    weight_grams: 250
    variants:
      - sku: SUM-250-WB
        name: 250 g whole bean
        stock_quantity: 40
      - sku: SUM-1KG-WB
        name: 1 kg whole bean
        price: "150.00"
"#;

    #[test]
    fn test_sample_parses_and_validates() {
        let file = SeedFile::parse(SAMPLE).unwrap();
        file.validate().unwrap();
        assert_eq!(file.categories.len(), 2);
        let product = &file.products[0];
        assert!(product.is_active);
        assert!(!product.is_featured);
        assert_eq!(product.variants[1].stock_quantity, 0);
        assert_eq!(product.variants[1].price, Some(Decimal::new(15000, 2)));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = SeedFile::parse("products:\n  - name: X\n    base_price: \"1\"\n    colour: red\n");
        assert!(matches!(err, Err(SeedError::Yaml(_))));
    }

    #[test]
    fn test_parent_must_come_first() {
        let file = SeedFile::parse(
            "categories:\n  - name: Single Origin\n    parent: coffee\n  - name: Coffee\n",
        )
        .unwrap();
        assert!(matches!(file.validate(), Err(SeedError::Invalid(_))));
    }

    #[test]
    fn test_duplicate_sku_rejected() {
        let file = SeedFile::parse(
            "products:\n  - name: A\n    base_price: \"1\"\n    variants:\n      - sku: X1\n        name: a\n  - name: B\n    base_price: \"1\"\n    variants:\n      - sku: X1\n        name: b\n",
        )
        .unwrap();
        assert!(matches!(file.validate(), Err(SeedError::Invalid(_))));
    }

    #[test]
    fn test_negative_price_rejected() {
        let file = SeedFile::parse(
            "products:\n  - name: A\n    base_price: \"-1\"\n    variants:\n      - sku: X1\n        name: a\n",
        )
        .unwrap();
        assert!(matches!(file.validate(), Err(SeedError::Invalid(_))));
    }

    #[test]
    fn test_product_needs_variant() {
        let file = SeedFile::parse("products:\n  - name: A\n    base_price: \"1\"\n").unwrap();
        assert!(matches!(file.validate(), Err(SeedError::Invalid(_))));
    }
}
