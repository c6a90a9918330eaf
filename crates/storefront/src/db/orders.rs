//! Order storage for checkout and customer order history.
//!
//! Orders are created `pending`/`unpaid` at checkout and only become `paid`
//! through the Stripe webhook. The transaction-scoped functions at the bottom
//! of this module take a `&mut PgConnection` so the payment service can run
//! them inside one transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use kedai_core::pricing::OrderTotals;
use kedai_core::{
    CurrencyCode, Email, OrderId, OrderItemId, OrderStatus, PageRequest, Paginated, PaymentStatus,
    Price, ProductId, ProfileId, ShipmentStatus, ShippingAddress, VariantId,
};

use super::RepositoryError;
use crate::models::{OrderDetail, OrderItem, OrderSummary, ShipmentTracking};

// =============================================================================
// Inputs
// =============================================================================

/// Order header to insert at checkout.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub profile_id: ProfileId,
    pub contact_email: &'a Email,
    pub totals: &'a OrderTotals,
    pub shipping_address: &'a ShippingAddress,
    pub notes: Option<&'a str>,
}

/// Line snapshot taken at checkout.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub weight_grams: Option<i32>,
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    id: OrderId,
    order_number: String,
    status: OrderStatus,
    payment_status: PaymentStatus,
    currency: CurrencyCode,
    total: Decimal,
    item_count: i64,
    created_at: DateTime<Utc>,
}

impl From<OrderSummaryRow> for OrderSummary {
    fn from(row: OrderSummaryRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            status: row.status,
            status_label: row.status.label(),
            payment_status: row.payment_status,
            total: Price::new(row.total, row.currency),
            item_count: row.item_count,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    status: OrderStatus,
    payment_status: PaymentStatus,
    contact_email: String,
    currency: CurrencyCode,
    subtotal: Decimal,
    shipping_fee: Decimal,
    tax: Decimal,
    total: Decimal,
    shipping_address: Json<ShippingAddress>,
    notes: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
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
}

#[derive(Debug, sqlx::FromRow)]
struct ShipmentRow {
    status: ShipmentStatus,
    courier: Option<String>,
    awb_no: Option<String>,
    tracking_url: Option<String>,
}

/// Lightweight status view for the checkout success page.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct OrderStatusView {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

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

    /// Insert a pending order with its item snapshots.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number is taken.
    /// Returns `RepositoryError::DataCorruption` if the address cannot be encoded.
    pub async fn create_pending(
        &self,
        order: &NewOrder<'_>,
        items: &[NewOrderItem],
    ) -> Result<OrderId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, OrderId>(
            r"
            INSERT INTO orders (
                order_number, profile_id, contact_email, status, payment_status, currency,
                subtotal, shipping_fee, tax, total, shipping_address, notes
            )
            VALUES ($1, $2, $3, 'pending', 'unpaid', $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            ",
        )
        .bind(order.order_number)
        .bind(order.profile_id)
        .bind(order.contact_email)
        .bind(order.totals.total.currency_code)
        .bind(order.totals.subtotal.amount)
        .bind(order.totals.shipping.amount)
        .bind(order.totals.tax.amount)
        .bind(order.totals.total.amount)
        .bind(Json(order.shipping_address))
        .bind(order.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "order number already exists"))?;

        for item in items {
            sqlx::query(
                r"
                INSERT INTO order_items (
                    order_id, product_id, variant_id, product_name, variant_name, sku,
                    unit_price, quantity, line_total, weight_grams
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(id)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(&item.product_name)
            .bind(&item.variant_name)
            .bind(&item.sku)
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(item.line_total)
            .bind(item.weight_grams)
            .execute(&mut *tx)
            .await?;
        }

        record_status(&mut tx, id, None, OrderStatus::Pending, Some("checkout started")).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Remember the Stripe Checkout Session created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_stripe_session(
        &self,
        order_id: OrderId,
        session_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE orders SET stripe_session_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(order_id)
        .bind(session_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Cancel a pending order whose payment could not be started or completed.
    ///
    /// Returns `false` when the order was no longer pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fail_pending(&self, order_id: OrderId, note: &str) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let cancelled = fail_pending(&mut tx, order_id, note).await?;
        tx.commit().await?;
        Ok(cancelled)
    }

    /// Status of one of the customer's orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_for_profile(
        &self,
        order_id: OrderId,
        profile_id: ProfileId,
    ) -> Result<Option<OrderStatusView>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderStatusView>(
            r"
            SELECT id, order_number, status, payment_status
            FROM orders
            WHERE id = $1 AND profile_id = $2
            ",
        )
        .bind(order_id)
        .bind(profile_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// The customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_profile(
        &self,
        profile_id: ProfileId,
        page: PageRequest,
    ) -> Result<Paginated<OrderSummary>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE profile_id = $1")
            .bind(profile_id)
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            r"
            SELECT o.id, o.order_number, o.status, o.payment_status, o.currency, o.total,
                   COALESCE((SELECT SUM(quantity) FROM order_items WHERE order_id = o.id), 0)::bigint
                       AS item_count,
                   o.created_at
            FROM orders o
            WHERE o.profile_id = $1
            ORDER BY o.created_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(profile_id)
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

    /// One of the customer's orders with items and tracking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn detail_for_profile(
        &self,
        order_id: OrderId,
        profile_id: ProfileId,
    ) -> Result<Option<OrderDetail>, RepositoryError> {
        let Some(order) = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_number, status, payment_status, contact_email, currency,
                   subtotal, shipping_fee, tax, total, shipping_address, notes,
                   paid_at, shipped_at, delivered_at, cancelled_at, created_at
            FROM orders
            WHERE id = $1 AND profile_id = $2
            ",
        )
        .bind(order_id)
        .bind(profile_id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, product_id, variant_id, product_name, variant_name, sku,
                   unit_price, quantity, line_total
            FROM order_items
            WHERE order_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        let shipment = sqlx::query_as::<_, ShipmentRow>(
            "SELECT status, courier, awb_no, tracking_url FROM shipments WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        let currency = order.currency;
        Ok(Some(OrderDetail {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            status_label: order.status.label(),
            payment_status: order.payment_status,
            contact_email: order.contact_email,
            subtotal: Price::new(order.subtotal, currency),
            shipping_fee: Price::new(order.shipping_fee, currency),
            tax: Price::new(order.tax, currency),
            total: Price::new(order.total, currency),
            shipping_address: order.shipping_address.0,
            notes: order.notes,
            items: items
                .into_iter()
                .map(|i| OrderItem {
                    id: i.id,
                    product_id: i.product_id,
                    variant_id: i.variant_id,
                    product_name: i.product_name,
                    variant_name: i.variant_name,
                    sku: i.sku,
                    unit_price: Price::new(i.unit_price, currency),
                    quantity: i.quantity,
                    line_total: Price::new(i.line_total, currency),
                })
                .collect(),
            shipment: shipment.map(|s| ShipmentTracking {
                status: s.status,
                courier: s.courier,
                awb_no: s.awb_no,
                tracking_url: s.tracking_url,
            }),
            paid_at: order.paid_at,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
            cancelled_at: order.cancelled_at,
            created_at: order.created_at,
        }))
    }
}

// =============================================================================
// Transaction-scoped operations (payment materialization)
// =============================================================================

/// An order row locked for update.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedOrder {
    pub id: OrderId,
    pub order_number: String,
    pub profile_id: Option<ProfileId>,
    pub status: OrderStatus,
    pub currency: CurrencyCode,
    pub total: Decimal,
}

/// Line data needed to take stock.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockLine {
    pub id: OrderItemId,
    pub variant_id: Option<VariantId>,
    pub sku: String,
    pub quantity: i32,
}

/// Lock an order row for the rest of the transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<LockedOrder>, RepositoryError> {
    let row = sqlx::query_as::<_, LockedOrder>(
        r"
        SELECT id, order_number, profile_id, status, currency, total
        FROM orders
        WHERE id = $1
        FOR UPDATE
        ",
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Mark a pending order paid.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn mark_paid(
    conn: &mut PgConnection,
    order_id: OrderId,
    session_id: &str,
    payment_intent_id: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE orders
        SET status = 'paid',
            payment_status = 'paid',
            paid_at = now(),
            stripe_session_id = COALESCE(stripe_session_id, $2),
            stripe_payment_intent_id = $3,
            updated_at = now()
        WHERE id = $1 AND status = 'pending'
        ",
    )
    .bind(order_id)
    .bind(session_id)
    .bind(payment_intent_id)
    .execute(&mut *conn)
    .await?;

    record_status(conn, order_id, Some(OrderStatus::Pending), OrderStatus::Paid, None).await
}

/// Lines of an order, for stock decrement.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn stock_lines(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<StockLine>, RepositoryError> {
    let rows = sqlx::query_as::<_, StockLine>(
        "SELECT id, variant_id, sku, quantity FROM order_items WHERE order_id = $1 ORDER BY variant_id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Take a line's units from stock if that many are available, recording
/// them on the line as `stock_taken`.
///
/// Returns the remaining stock, or `None` when the guard failed and neither
/// the variant nor the line was changed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    item_id: OrderItemId,
    variant_id: VariantId,
    quantity: i32,
) -> Result<Option<i32>, RepositoryError> {
    let remaining = sqlx::query_scalar::<_, i32>(
        r"
        WITH taken AS (
            UPDATE product_variants
            SET stock_quantity = stock_quantity - $3, updated_at = now()
            WHERE id = $2 AND stock_quantity >= $3
            RETURNING stock_quantity
        ), recorded AS (
            UPDATE order_items
            SET stock_taken = $3
            WHERE id = $1 AND EXISTS (SELECT 1 FROM taken)
        )
        SELECT stock_quantity FROM taken
        ",
    )
    .bind(item_id)
    .bind(variant_id)
    .bind(quantity)
    .fetch_optional(conn)
    .await?;

    Ok(remaining)
}

/// Flag an order whose stock could not be fully taken.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn flag_stock_conflict(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET stock_conflict = TRUE, updated_at = now() WHERE id = $1")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Cancel a still-pending order and mark its payment failed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn fail_pending(
    conn: &mut PgConnection,
    order_id: OrderId,
    note: &str,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE orders
        SET status = 'cancelled', payment_status = 'failed',
            cancelled_at = now(), updated_at = now()
        WHERE id = $1 AND status = 'pending'
        ",
    )
    .bind(order_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(false);
    }

    record_status(
        conn,
        order_id,
        Some(OrderStatus::Pending),
        OrderStatus::Cancelled,
        Some(note),
    )
    .await?;
    Ok(true)
}

/// Append to the order's status history.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn record_status(
    conn: &mut PgConnection,
    order_id: OrderId,
    from: Option<OrderStatus>,
    to: OrderStatus,
    note: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO order_status_history (order_id, from_status, to_status, note)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(order_id)
    .bind(from)
    .bind(to)
    .bind(note)
    .execute(conn)
    .await?;
    Ok(())
}
