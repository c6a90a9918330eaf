//! Customer-facing order models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kedai_core::{
    OrderId, OrderItemId, OrderStatus, PaymentStatus, Price, ProductId, ShipmentStatus,
    ShippingAddress, VariantId,
};

/// Row in the customer's order history.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub payment_status: PaymentStatus,
    pub total: Price,
    pub item_count: i64,
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
    pub unit_price: Price,
    pub quantity: i32,
    pub line_total: Price,
}

/// Courier tracking details, present once a shipment exists.
#[derive(Debug, Clone, Serialize)]
pub struct ShipmentTracking {
    pub status: ShipmentStatus,
    pub courier: Option<String>,
    pub awb_no: Option<String>,
    pub tracking_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub payment_status: PaymentStatus,
    pub contact_email: String,
    pub subtotal: Price,
    pub shipping_fee: Price,
    pub tax: Price,
    pub total: Price,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub shipment: Option<ShipmentTracking>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
