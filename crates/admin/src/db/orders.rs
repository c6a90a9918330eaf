//! Order queue, fulfilment reads and status transitions.
//!
//! Transitions run inside a transaction owned by the lifecycle service, so
//! the write helpers at the bottom of this module take a `&mut PgConnection`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use kedai_core::{
    CurrencyCode, OrderId, OrderItemId, OrderStatus, PageRequest, Paginated, PaymentStatus,
    ProductId, ProfileId, ShippingAddress, VariantId,
};

use super::shipments::{SHIPMENT_COLUMNS, ShipmentRow};
use super::{RepositoryError, like_pattern};
use crate::models::{
    AdminOrderDetail, AdminOrderSummary, Customer, OrderItem, ShippingLine, StatusChange,
};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: OrderId,
    order_number: String,
    contact_email: String,
    status: OrderStatus,
    payment_status: PaymentStatus,
    currency: CurrencyCode,
    total: Decimal,
    item_count: i64,
    stock_conflict: bool,
    has_shipment: bool,
    created_at: DateTime<Utc>,
}

impl From<SummaryRow> for AdminOrderSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            contact_email: row.contact_email,
            status: row.status,
            payment_status: row.payment_status,
            currency: row.currency,
            total: row.total,
            item_count: row.item_count,
            stock_conflict: row.stock_conflict,
            has_shipment: row.has_shipment,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    profile_id: Option<ProfileId>,
    contact_email: String,
    status: OrderStatus,
    payment_status: PaymentStatus,
    currency: CurrencyCode,
    subtotal: Decimal,
    shipping_fee: Decimal,
    tax: Decimal,
    total: Decimal,
    shipping_address: Json<ShippingAddress>,
    notes: Option<String>,
    stock_conflict: bool,
    stripe_session_id: Option<String>,
    stripe_payment_intent_id: Option<String>,
    stripe_refund_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    product_id: Option<ProductId>,
    variant_id: Option<VariantId>,
    product_name: String,
    variant_name: String,
    sku: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
    weight_grams: Option<i32>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            variant_id: row.variant_id,
            product_name: row.product_name,
            variant_name: row.variant_name,
            sku: row.sku,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
            weight_grams: row.weight_grams,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: ProfileId,
    email: String,
    full_name: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    note: Option<String>,
    actor_email: Option<String>,
    created_at: DateTime<Utc>,
}

const LIST_FILTER: &str = r"
    WHERE ($1::order_status IS NULL OR o.status = $1)
      AND ($2::text IS NULL OR o.order_number ILIKE $2 OR o.contact_email ILIKE $2)
";

/// What a shipment booking needs to know about an order.
#[derive(Debug, Clone)]
pub struct ShippingOrder {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub contact_email: String,
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub shipping_address: ShippingAddress,
    pub lines: Vec<ShippingLine>,
    /// Short parcel content description built from item names.
    pub content: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ShippingOrderRow {
    id: OrderId,
    order_number: String,
    status: OrderStatus,
    contact_email: String,
    currency: CurrencyCode,
    subtotal: Decimal,
    shipping_address: Json<ShippingAddress>,
}

#[derive(Debug, sqlx::FromRow)]
struct ShippingLineRow {
    product_name: String,
    weight_grams: Option<i32>,
    quantity: i32,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Paginated order queue, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        q: Option<&str>,
        page: PageRequest,
    ) -> Result<Paginated<AdminOrderSummary>, RepositoryError> {
        let pattern = like_pattern(q);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders o {LIST_FILTER}"))
            .bind(status)
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, SummaryRow>(&format!(
            r"
            SELECT o.id, o.order_number, o.contact_email, o.status, o.payment_status,
                   o.currency, o.total, o.stock_conflict, o.created_at,
                   COALESCE((SELECT SUM(quantity) FROM order_items WHERE order_id = o.id), 0)::bigint
                       AS item_count,
                   EXISTS (SELECT 1 FROM shipments s WHERE s.order_id = o.id) AS has_shipment
            FROM orders o
            {LIST_FILTER}
            ORDER BY o.created_at DESC, o.id
            LIMIT $3 OFFSET $4
            "
        ))
        .bind(status)
        .bind(pattern.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Paginated::new(
            rows.into_iter().map(Into::into).collect(),
            page,
            total,
        ))
    }

    /// Full order view: items, customer, shipment, status history.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn detail(&self, id: OrderId) -> Result<Option<AdminOrderDetail>, RepositoryError> {
        let Some(order) = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_number, profile_id, contact_email, status, payment_status, currency,
                   subtotal, shipping_fee, tax, total, shipping_address, notes, stock_conflict,
                   stripe_session_id, stripe_payment_intent_id, stripe_refund_id,
                   paid_at, shipped_at, delivered_at, cancelled_at, refunded_at, created_at
            FROM orders
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, product_id, variant_id, product_name, variant_name, sku,
                   unit_price, quantity, line_total, weight_grams
            FROM order_items
            WHERE order_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let customer = match order.profile_id {
            Some(profile_id) => sqlx::query_as::<_, CustomerRow>(
                "SELECT id, email, full_name, phone FROM profiles WHERE id = $1",
            )
            .bind(profile_id)
            .fetch_optional(self.pool)
            .await?
            .map(|c| Customer {
                id: c.id,
                email: c.email,
                full_name: c.full_name,
                phone: c.phone,
            }),
            None => None,
        };

        let shipment = sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE order_id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let history = sqlx::query_as::<_, HistoryRow>(
            r"
            SELECT h.from_status, h.to_status, h.note, p.email AS actor_email, h.created_at
            FROM order_status_history h
            LEFT JOIN profiles p ON p.id = h.actor_id
            WHERE h.order_id = $1
            ORDER BY h.created_at, h.id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(AdminOrderDetail {
            id: order.id,
            order_number: order.order_number,
            contact_email: order.contact_email,
            status: order.status,
            payment_status: order.payment_status,
            currency: order.currency,
            subtotal: order.subtotal,
            shipping_fee: order.shipping_fee,
            tax: order.tax,
            total: order.total,
            shipping_address: order.shipping_address.0,
            notes: order.notes,
            stock_conflict: order.stock_conflict,
            stripe_session_id: order.stripe_session_id,
            stripe_payment_intent_id: order.stripe_payment_intent_id,
            stripe_refund_id: order.stripe_refund_id,
            customer,
            items: items.into_iter().map(Into::into).collect(),
            shipment: shipment.map(Into::into),
            history: history
                .into_iter()
                .map(|h| StatusChange {
                    from_status: h.from_status,
                    to_status: h.to_status,
                    note: h.note,
                    actor_email: h.actor_email,
                    created_at: h.created_at,
                })
                .collect(),
            paid_at: order.paid_at,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
            cancelled_at: order.cancelled_at,
            refunded_at: order.refunded_at,
            created_at: order.created_at,
        }))
    }

    /// Current status and payment intent, read without locking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn snapshot(&self, id: OrderId) -> Result<Option<LockedOrder>, RepositoryError> {
        let row = sqlx::query_as::<_, LockedOrder>(&format!(
            "SELECT {LOCKED_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Order data needed to quote and book a shipment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn for_shipping(&self, id: OrderId) -> Result<Option<ShippingOrder>, RepositoryError> {
        let Some(order) = sqlx::query_as::<_, ShippingOrderRow>(
            r"
            SELECT id, order_number, status, contact_email, currency, subtotal, shipping_address
            FROM orders
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, ShippingLineRow>(
            r"
            SELECT oi.product_name,
                   COALESCE(oi.weight_grams, v.weight_grams, p.weight_grams) AS weight_grams,
                   oi.quantity
            FROM order_items oi
            LEFT JOIN product_variants v ON v.id = oi.variant_id
            LEFT JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.created_at, oi.id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let content = parcel_content(lines.iter().map(|l| l.product_name.as_str()));

        Ok(Some(ShippingOrder {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            contact_email: order.contact_email,
            currency: order.currency,
            subtotal: order.subtotal,
            shipping_address: order.shipping_address.0,
            lines: lines
                .into_iter()
                .map(|l| ShippingLine {
                    weight_grams: l.weight_grams,
                    quantity: l.quantity,
                })
                .collect(),
            content,
        }))
    }
}

/// Longest parcel content description couriers accept.
const MAX_CONTENT_LEN: usize = 35;

/// Distinct item names joined for the courier's "content" field.
fn parcel_content<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    let joined = seen.join(", ");
    if joined.is_empty() {
        return "Merchandise".to_string();
    }
    if joined.chars().count() <= MAX_CONTENT_LEN {
        return joined;
    }
    let truncated: String = joined.chars().take(MAX_CONTENT_LEN - 3).collect();
    format!("{}...", truncated.trim_end())
}

// =============================================================================
// Transaction-scoped operations (status lifecycle)
// =============================================================================

/// An order row as seen by the lifecycle service.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedOrder {
    pub id: OrderId,
    pub order_number: String,
    pub profile_id: Option<ProfileId>,
    pub contact_email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub currency: CurrencyCode,
    pub total: Decimal,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_refund_id: Option<String>,
}

const LOCKED_COLUMNS: &str = "id, order_number, profile_id, contact_email, status, \
     payment_status, currency, total, stripe_payment_intent_id, stripe_refund_id";

/// Lock an order row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<LockedOrder>, RepositoryError> {
    let row = sqlx::query_as::<_, LockedOrder>(&format!(
        "SELECT {LOCKED_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Move an order to `next`, stamping the matching lifecycle timestamp.
///
/// `payment_status` and `refund_id` are only written when given.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn transition(
    conn: &mut PgConnection,
    id: OrderId,
    next: OrderStatus,
    payment_status: Option<PaymentStatus>,
    refund_id: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE orders
        SET status = $2,
            payment_status = COALESCE($3, payment_status),
            stripe_refund_id = COALESCE($4, stripe_refund_id),
            shipped_at = CASE WHEN $2 = 'shipped' THEN now() ELSE shipped_at END,
            delivered_at = CASE WHEN $2 = 'delivered' THEN now() ELSE delivered_at END,
            cancelled_at = CASE WHEN $2 = 'cancelled' THEN now() ELSE cancelled_at END,
            refunded_at = CASE WHEN $3 = 'refunded' THEN now() ELSE refunded_at END,
            updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(next)
    .bind(payment_status)
    .bind(refund_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Append to the order's status history.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record_status(
    conn: &mut PgConnection,
    id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
    note: Option<&str>,
    actor_id: Option<ProfileId>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO order_status_history (order_id, from_status, to_status, note, actor_id)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(note)
    .bind(actor_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Units one order line took from stock when it was paid.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct TakenLine {
    pub variant_id: Option<VariantId>,
    pub stock_taken: i32,
}

/// Units to give back per variant.
///
/// Only what was actually taken is returned: a line whose decrement failed
/// at payment has `stock_taken = 0`. Lines whose variant has since been
/// deleted are skipped.
#[must_use]
pub fn returnable_stock(lines: &[TakenLine]) -> BTreeMap<VariantId, i32> {
    let mut returns = BTreeMap::new();
    for line in lines {
        let Some(variant_id) = line.variant_id else {
            continue;
        };
        if line.stock_taken <= 0 {
            continue;
        }
        let total: &mut i32 = returns.entry(variant_id).or_default();
        *total = total.saturating_add(line.stock_taken);
    }
    returns
}

/// Return the stock an order took to inventory and clear `stock_taken`, so
/// the same units can never be returned twice.
///
/// Returns the number of variants updated.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn restock(conn: &mut PgConnection, id: OrderId) -> Result<u64, RepositoryError> {
    let lines = sqlx::query_as::<_, TakenLine>(
        "SELECT variant_id, stock_taken FROM order_items WHERE order_id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let mut restocked = 0;
    for (variant_id, quantity) in returnable_stock(&lines) {
        let result = sqlx::query(
            r"
            UPDATE product_variants
            SET stock_quantity = stock_quantity + $2, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(variant_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
        restocked += result.rows_affected();
    }

    sqlx::query("UPDATE order_items SET stock_taken = 0 WHERE order_id = $1 AND stock_taken > 0")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(restocked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(n: u128) -> VariantId {
        VariantId::from(uuid::Uuid::from_u128(n))
    }

    #[test]
    fn test_conflicted_line_returns_nothing() {
        // Stock was short at payment, so the guarded decrement took nothing.
        let lines = [TakenLine {
            variant_id: Some(variant(1)),
            stock_taken: 0,
        }];
        assert!(returnable_stock(&lines).is_empty());
    }

    #[test]
    fn test_returns_only_what_was_taken() {
        let lines = [
            TakenLine {
                variant_id: Some(variant(1)),
                stock_taken: 2,
            },
            TakenLine {
                variant_id: Some(variant(1)),
                stock_taken: 3,
            },
            TakenLine {
                variant_id: Some(variant(2)),
                stock_taken: 0,
            },
            TakenLine {
                variant_id: None,
                stock_taken: 4,
            },
        ];
        let returns = returnable_stock(&lines);
        assert_eq!(returns.len(), 1);
        assert_eq!(returns.get(&variant(1)), Some(&5));
    }

    #[test]
    fn test_parcel_content_dedupes_names() {
        let content = parcel_content(["Kopi", "Teh", "Kopi"].into_iter());
        assert_eq!(content, "Kopi, Teh");
    }

    #[test]
    fn test_parcel_content_truncates() {
        let long = "A very long product name that keeps going";
        let content = parcel_content([long].into_iter());
        assert_eq!(content.chars().count(), MAX_CONTENT_LEN);
        assert!(content.ends_with("..."));
    }

    #[test]
    fn test_parcel_content_fallback() {
        assert_eq!(parcel_content(std::iter::empty()), "Merchandise");
    }
}
