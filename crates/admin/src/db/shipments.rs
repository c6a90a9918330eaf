//! EasyParcel shipment records.
//!
//! One row per order (`UNIQUE(order_id)`). A `failed` row may be replaced by
//! a new booking; a `submitted` or `paid` row blocks it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use kedai_core::{OrderId, ProfileId, ShipmentId, ShipmentStatus};

use super::RepositoryError;
use crate::models::Shipment;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ShipmentRow {
    id: ShipmentId,
    order_id: OrderId,
    status: ShipmentStatus,
    service_id: String,
    courier: Option<String>,
    price: Option<Decimal>,
    collect_date: Option<NaiveDate>,
    easyparcel_order_no: Option<String>,
    parcel_no: Option<String>,
    awb_no: Option<String>,
    tracking_url: Option<String>,
    error_message: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ShipmentRow> for Shipment {
    fn from(row: ShipmentRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            status: row.status,
            service_id: row.service_id,
            courier: row.courier,
            price: row.price,
            collect_date: row.collect_date,
            easyparcel_order_no: row.easyparcel_order_no,
            parcel_no: row.parcel_no,
            awb_no: row.awb_no,
            tracking_url: row.tracking_url,
            error_message: row.error_message,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) const SHIPMENT_COLUMNS: &str = "id, order_id, status, service_id, courier, price, \
     collect_date, easyparcel_order_no, parcel_no, awb_no, tracking_url, error_message, \
     paid_at, created_at, updated_at";

/// A booking EasyParcel accepted.
#[derive(Debug, Clone)]
pub struct SubmittedShipment<'a> {
    pub order_id: OrderId,
    pub service_id: &'a str,
    pub courier: Option<&'a str>,
    pub price: Option<Decimal>,
    pub collect_date: NaiveDate,
    pub easyparcel_order_no: &'a str,
    pub created_by: ProfileId,
}

/// Label details returned once a booking is paid.
#[derive(Debug, Clone)]
pub struct PaidParcel<'a> {
    pub parcel_no: Option<&'a str>,
    pub awb_no: Option<&'a str>,
    pub tracking_url: Option<&'a str>,
}

/// Repository for shipment operations.
pub struct ShipmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShipmentRepository<'a> {
    /// Create a new shipment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ShipmentId) -> Result<Option<Shipment>, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_order(&self, order_id: OrderId) -> Result<Option<Shipment>, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Persist an accepted booking as `submitted`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order already has an
    /// active shipment.
    pub async fn create_submitted(
        &self,
        shipment: &SubmittedShipment<'_>,
    ) -> Result<Shipment, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            r"
            INSERT INTO shipments
                (order_id, status, service_id, courier, price, collect_date,
                 easyparcel_order_no, created_by)
            VALUES ($1, 'submitted', $2, $3, $4, $5, $6, $7)
            ON CONFLICT (order_id) DO UPDATE
            SET status = 'submitted',
                service_id = EXCLUDED.service_id,
                courier = EXCLUDED.courier,
                price = EXCLUDED.price,
                collect_date = EXCLUDED.collect_date,
                easyparcel_order_no = EXCLUDED.easyparcel_order_no,
                created_by = EXCLUDED.created_by,
                parcel_no = NULL,
                awb_no = NULL,
                tracking_url = NULL,
                error_message = NULL,
                paid_at = NULL,
                updated_at = now()
            WHERE shipments.status = 'failed'
            RETURNING {SHIPMENT_COLUMNS}
            "
        ))
        .bind(shipment.order_id)
        .bind(shipment.service_id)
        .bind(shipment.courier)
        .bind(shipment.price)
        .bind(shipment.collect_date)
        .bind(shipment.easyparcel_order_no)
        .bind(shipment.created_by)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::Conflict("order already has a shipment".to_string()))?;

        Ok(row.into())
    }

    /// Claim a `submitted` shipment for label payment.
    ///
    /// Returns `false` if the shipment is no longer `submitted` or another
    /// request holds a claim younger than five minutes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn claim_payment(&self, id: ShipmentId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shipments
            SET payment_claimed_at = now(), updated_at = now()
            WHERE id = $1
              AND status = 'submitted'
              AND (payment_claimed_at IS NULL
                   OR payment_claimed_at < now() - interval '5 minutes')
            ",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record a purchased label and clear any previous error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the shipment does not exist.
    pub async fn mark_paid(
        &self,
        id: ShipmentId,
        parcel: &PaidParcel<'_>,
    ) -> Result<Shipment, RepositoryError> {
        let row = sqlx::query_as::<_, ShipmentRow>(&format!(
            r"
            UPDATE shipments
            SET status = 'paid', parcel_no = $2, awb_no = $3, tracking_url = $4,
                error_message = NULL, payment_claimed_at = NULL,
                paid_at = now(), updated_at = now()
            WHERE id = $1
            RETURNING {SHIPMENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(parcel.parcel_no)
        .bind(parcel.awb_no)
        .bind(parcel.tracking_url)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Keep the shipment `submitted`, remember why payment failed and release
    /// the payment claim.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_error(&self, id: ShipmentId, message: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE shipments
            SET error_message = $2, payment_claimed_at = NULL, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(message)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

/// Abandon an unpaid booking, freeing the order for a new one.
///
/// Paid shipments are left alone. Returns whether a row changed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn fail_unpaid(
    conn: &mut PgConnection,
    order_id: OrderId,
    reason: &str,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shipments
        SET status = 'failed', error_message = $2, updated_at = now()
        WHERE order_id = $1 AND status = 'submitted'
        ",
    )
    .bind(order_id)
    .bind(reason)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}
