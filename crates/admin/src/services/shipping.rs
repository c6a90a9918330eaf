//! EasyParcel shipment orchestration.
//!
//! Booking a label is two remote calls: submit (reserves a booking and
//! returns an EasyParcel order number) and pay (spends account credit and
//! returns the AWB). The booking is persisted between the two so a failed
//! payment can be retried without submitting a second booking.

use chrono::{FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use kedai_core::{
    OrderId, OrderStatus, ProfileId, ShipFrom, ShipmentId, ShipmentStatus, ShippingAddress,
};

use crate::db::orders::ShippingOrder;
use crate::db::shipments::{PaidParcel, SubmittedShipment};
use crate::db::{OrderRepository, RepositoryError, SettingsRepository, ShipmentRepository};
use crate::easyparcel::{
    EasyParcelClient, EasyParcelError, Party, Rate, RateRequest, SubmitOrderRequest, state_code,
};
use crate::models::{Shipment, ShippingLine};
use crate::services::lifecycle::{LifecycleError, LifecycleService, StatusChangeRequest};

/// Lightest parcel EasyParcel will quote, in grams.
const MIN_WEIGHT_GRAMS: i64 = 100;

/// Pickups are scheduled on Malaysian calendar days.
const MYT_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Debug, Error)]
pub enum ShippingError {
    #[error("order not found")]
    OrderNotFound,

    #[error("shipment not found")]
    ShipmentNotFound,

    #[error("order is {0}; only paid or processing orders can be shipped")]
    NotShippable(OrderStatus),

    #[error("order already has an active shipment")]
    AlreadyBooked,

    #[error("shipment is {0} and cannot be paid")]
    NotPayable(ShipmentStatus),

    #[error("label payment for this shipment is already in progress")]
    PaymentInProgress,

    #[error("unknown state for courier booking: {0}")]
    UnknownState(String),

    #[error("collect date cannot be in the past")]
    CollectDateInPast,

    #[error("label payment failed: {message}")]
    PaymentFailed {
        shipment_id: ShipmentId,
        message: String,
    },

    #[error("courier error: {0}")]
    Courier(#[from] EasyParcelError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Staff input for booking a shipment.
#[derive(Debug, Clone, Deserialize)]
pub struct BookShipment {
    pub service_id: String,
    /// Defaults to today.
    pub collect_date: Option<NaiveDate>,
}

/// Total parcel weight in kilograms.
///
/// Lines without a weight count as zero; the result never drops below 0.1 kg.
#[must_use]
pub fn parcel_weight_kg(lines: &[ShippingLine]) -> Decimal {
    let grams: i64 = lines
        .iter()
        .map(|line| i64::from(line.weight_grams.unwrap_or(0).max(0)) * i64::from(line.quantity))
        .sum();
    Decimal::new(grams.max(MIN_WEIGHT_GRAMS), 3).normalize()
}

/// Today's date in Malaysia.
#[must_use]
pub fn local_today() -> NaiveDate {
    FixedOffset::east_opt(MYT_OFFSET_SECS).map_or_else(
        || Utc::now().date_naive(),
        |offset| Utc::now().with_timezone(&offset).date_naive(),
    )
}

fn courier_state(state: &str) -> Result<&'static str, ShippingError> {
    state_code(state).ok_or_else(|| ShippingError::UnknownState(state.to_owned()))
}

fn origin_party(origin: &ShipFrom) -> Result<Party, ShippingError> {
    Ok(Party {
        name: origin.name.clone(),
        phone: origin.phone.clone(),
        address1: origin.address.clone(),
        address2: None,
        city: origin.city.clone(),
        postcode: origin.postcode.clone(),
        state: courier_state(&origin.state)?.to_owned(),
        country: origin.country.clone(),
    })
}

fn destination_party(address: &ShippingAddress) -> Result<Party, ShippingError> {
    Ok(Party {
        name: address.recipient_name.clone(),
        phone: address.phone.clone(),
        address1: address.line1.clone(),
        address2: address.line2.clone(),
        city: address.city.clone(),
        postcode: address.postcode.clone(),
        state: courier_state(&address.state)?.to_owned(),
        country: address.country.clone(),
    })
}

fn ensure_shippable(status: OrderStatus) -> Result<(), ShippingError> {
    match status {
        OrderStatus::Paid | OrderStatus::Processing => Ok(()),
        other => Err(ShippingError::NotShippable(other)),
    }
}

/// Shipment booking service.
pub struct ShippingService<'a> {
    pool: &'a PgPool,
    easyparcel: &'a EasyParcelClient,
    lifecycle: LifecycleService<'a>,
}

impl<'a> ShippingService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        easyparcel: &'a EasyParcelClient,
        lifecycle: LifecycleService<'a>,
    ) -> Self {
        Self {
            pool,
            easyparcel,
            lifecycle,
        }
    }

    /// Quote courier services from the store origin to the order's address.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::UnknownState` if either address has a state
    /// EasyParcel does not know, or `ShippingError::Courier` for API failures.
    #[tracing::instrument(skip(self))]
    pub async fn rates(&self, order_id: OrderId) -> Result<Vec<Rate>, ShippingError> {
        let order = self.load_order(order_id).await?;
        let origin = SettingsRepository::new(self.pool).get().await?.ship_from;

        let request = RateRequest {
            pick_postcode: origin.postcode.clone(),
            pick_state: courier_state(&origin.state)?.to_owned(),
            pick_country: origin.country.clone(),
            send_postcode: order.shipping_address.postcode.clone(),
            send_state: courier_state(&order.shipping_address.state)?.to_owned(),
            send_country: order.shipping_address.country.clone(),
            weight_kg: parcel_weight_kg(&order.lines),
        };

        Ok(self.easyparcel.rate_check(&request).await?)
    }

    /// The order's shipment, if any.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::Repository` if the query fails.
    pub async fn get(&self, order_id: OrderId) -> Result<Option<Shipment>, ShippingError> {
        Ok(ShipmentRepository::new(self.pool)
            .get_by_order(order_id)
            .await?)
    }

    /// Submit a booking, pay for it and mark the order shipped.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::NotShippable` or `ShippingError::AlreadyBooked`
    /// before anything is sent to EasyParcel, and
    /// `ShippingError::PaymentFailed` when the booking was saved but its label
    /// could not be paid.
    #[tracing::instrument(skip(self, booking), fields(service_id = %booking.service_id))]
    pub async fn book(
        &self,
        order_id: OrderId,
        booking: &BookShipment,
        actor: ProfileId,
    ) -> Result<Shipment, ShippingError> {
        let order = self.load_order(order_id).await?;
        ensure_shippable(order.status)?;

        let shipments = ShipmentRepository::new(self.pool);
        if let Some(existing) = shipments.get_by_order(order_id).await?
            && existing.status.is_active()
        {
            return Err(ShippingError::AlreadyBooked);
        }

        let today = local_today();
        let collect_date = booking.collect_date.unwrap_or(today);
        if collect_date < today {
            return Err(ShippingError::CollectDateInPast);
        }

        let origin = SettingsRepository::new(self.pool).get().await?.ship_from;
        let request = SubmitOrderRequest {
            service_id: booking.service_id.clone(),
            weight_kg: parcel_weight_kg(&order.lines),
            content: order.content.clone(),
            value: order.subtotal,
            pick: origin_party(&origin)?,
            send: destination_party(&order.shipping_address)?,
            send_email: order.contact_email.clone(),
            collect_date,
            reference: order.order_number.clone(),
        };

        let submitted = self.easyparcel.submit_order(&request).await?;
        let shipment = shipments
            .create_submitted(&SubmittedShipment {
                order_id,
                service_id: &booking.service_id,
                courier: submitted.courier.as_deref(),
                price: submitted.price,
                collect_date,
                easyparcel_order_no: &submitted.order_number,
                created_by: actor,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ShippingError::AlreadyBooked,
                other => other.into(),
            })?;

        self.pay_and_ship(shipment, actor).await
    }

    /// Retry label payment for a booking left `submitted`.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::NotPayable` unless the shipment is `submitted`,
    /// and `ShippingError::PaymentInProgress` while another request is paying
    /// for it.
    #[tracing::instrument(skip(self))]
    pub async fn retry_payment(
        &self,
        shipment_id: ShipmentId,
        actor: ProfileId,
    ) -> Result<Shipment, ShippingError> {
        let shipment = ShipmentRepository::new(self.pool)
            .get(shipment_id)
            .await?
            .ok_or(ShippingError::ShipmentNotFound)?;
        if shipment.status != ShipmentStatus::Submitted {
            return Err(ShippingError::NotPayable(shipment.status));
        }

        let order = OrderRepository::new(self.pool)
            .snapshot(shipment.order_id)
            .await?
            .ok_or(ShippingError::OrderNotFound)?;
        ensure_shippable(order.status)?;

        self.pay_and_ship(shipment, actor).await
    }

    async fn pay_and_ship(
        &self,
        shipment: Shipment,
        actor: ProfileId,
    ) -> Result<Shipment, ShippingError> {
        let shipments = ShipmentRepository::new(self.pool);
        let Some(ep_order_no) = shipment.easyparcel_order_no.as_deref() else {
            return Err(ShippingError::NotPayable(shipment.status));
        };

        // Only one request may pay a label at a time.
        if !shipments.claim_payment(shipment.id).await? {
            return Err(ShippingError::PaymentInProgress);
        }

        let paid = match self.easyparcel.pay_order(ep_order_no).await {
            Ok(paid) => paid,
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(shipment_id = %shipment.id, error = %message, "Label payment failed");
                shipments.record_error(shipment.id, &message).await?;
                return Err(ShippingError::PaymentFailed {
                    shipment_id: shipment.id,
                    message,
                });
            }
        };

        let shipment = shipments
            .mark_paid(
                shipment.id,
                &PaidParcel {
                    parcel_no: paid.parcel_no.as_deref(),
                    awb_no: paid.awb_no.as_deref(),
                    tracking_url: paid.tracking_url.as_deref(),
                },
            )
            .await?;

        let note = match (&shipment.courier, &shipment.awb_no) {
            (Some(courier), Some(awb)) => format!("Shipped with {courier}, AWB {awb}"),
            (None, Some(awb)) => format!("Shipped, AWB {awb}"),
            _ => "Shipped".to_owned(),
        };
        self.lifecycle
            .transition(&StatusChangeRequest {
                order_id: shipment.order_id,
                next: OrderStatus::Shipped,
                note: Some(&note),
                actor: Some(actor),
            })
            .await?;

        Ok(shipment)
    }

    async fn load_order(&self, order_id: OrderId) -> Result<ShippingOrder, ShippingError> {
        OrderRepository::new(self.pool)
            .for_shipping(order_id)
            .await?
            .ok_or(ShippingError::OrderNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(weight_grams: Option<i32>, quantity: i32) -> ShippingLine {
        ShippingLine {
            weight_grams,
            quantity,
        }
    }

    #[test]
    fn test_parcel_weight_sums_lines() {
        let lines = [line(Some(250), 2), line(Some(1200), 1)];
        assert_eq!(parcel_weight_kg(&lines), Decimal::new(17, 1));
    }

    #[test]
    fn test_parcel_weight_has_minimum() {
        assert_eq!(parcel_weight_kg(&[line(None, 3)]), Decimal::new(1, 1));
        assert_eq!(parcel_weight_kg(&[line(Some(20), 1)]), Decimal::new(1, 1));
        assert_eq!(parcel_weight_kg(&[]), Decimal::new(1, 1));
    }

    #[test]
    fn test_ensure_shippable() {
        assert!(ensure_shippable(OrderStatus::Paid).is_ok());
        assert!(ensure_shippable(OrderStatus::Processing).is_ok());
        assert!(matches!(
            ensure_shippable(OrderStatus::Pending),
            Err(ShippingError::NotShippable(OrderStatus::Pending))
        ));
        assert!(ensure_shippable(OrderStatus::Shipped).is_err());
    }

    #[test]
    fn test_destination_party_maps_state() {
        let address = ShippingAddress {
            recipient_name: "Aminah".to_owned(),
            phone: "0123456789".to_owned(),
            line1: "12 Jalan Ampang".to_owned(),
            line2: None,
            city: "Kuala Lumpur".to_owned(),
            state: "Selangor".to_owned(),
            postcode: "68000".to_owned(),
            country: "MY".to_owned(),
        };
        let party = destination_party(&address).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(party.state, "sgr");

        let unknown = ShippingAddress {
            state: "Atlantis".to_owned(),
            ..address
        };
        assert!(matches!(
            destination_party(&unknown),
            Err(ShippingError::UnknownState(_))
        ));
    }
}
