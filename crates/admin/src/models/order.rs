//! Order models for fulfilment.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use kedai_core::{
    CurrencyCode, OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, ProfileId,
    ShipmentId, ShipmentStatus, ShippingAddress, VariantId,
};

/// Row in the order queue.
#[derive(Debug, Clone, Serialize)]
pub struct AdminOrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub contact_email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub currency: CurrencyCode,
    pub total: Decimal,
    pub item_count: i64,
    pub stock_conflict: bool,
    pub has_shipment: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub weight_grams: Option<i32>,
}

/// The account that placed an order, if it still exists.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: ProfileId,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub note: Option<String>,
    pub actor_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub status: ShipmentStatus,
    pub service_id: String,
    pub courier: Option<String>,
    pub price: Option<Decimal>,
    pub collect_date: Option<NaiveDate>,
    pub easyparcel_order_no: Option<String>,
    pub parcel_no: Option<String>,
    pub awb_no: Option<String>,
    pub tracking_url: Option<String>,
    pub error_message: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminOrderDetail {
    pub id: OrderId,
    pub order_number: String,
    pub contact_email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub stock_conflict: bool,
    pub stripe_session_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub stripe_refund_id: Option<String>,
    pub customer: Option<Customer>,
    pub items: Vec<OrderItem>,
    pub shipment: Option<Shipment>,
    pub history: Vec<StatusChange>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Order line used to compute parcel weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingLine {
    pub weight_grams: Option<i32>,
    pub quantity: i32,
}
