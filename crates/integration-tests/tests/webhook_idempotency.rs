//! Stripe webhook delivery tests: redelivery and stock guarding.
//!
//! Needs both servers, a seeded catalog, Stripe test keys on the storefront,
//! `STRIPE_WEBHOOK_SECRET`, and a staff account for stock setup.

use kedai_integration_tests::{
    admin_url, checkout_completed_event, deliver_event, register_customer, session_client,
    staff_client, storefront_url, test_address,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// First seeded product and its first variant: `(product_id, variant_id)`.
async fn first_variant() -> (String, String) {
    let base = storefront_url();
    let client = Client::new();

    let page: Value = client
        .get(format!("{base}/api/products"))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Invalid product page");
    let slug = page["items"][0]["slug"]
        .as_str()
        .expect("Seeded catalog should have at least one product")
        .to_owned();

    let product: Value = client
        .get(format!("{base}/api/products/{slug}"))
        .send()
        .await
        .expect("Failed to fetch product")
        .json()
        .await
        .expect("Invalid product");

    (
        product["id"].as_str().expect("product id").to_owned(),
        product["variants"][0]["id"]
            .as_str()
            .expect("variant id")
            .to_owned(),
    )
}

async fn set_stock(staff: &Client, variant_id: &str, quantity: i32) {
    let resp = staff
        .put(format!("{}/api/variants/{variant_id}/stock", admin_url()))
        .json(&json!({ "quantity": quantity }))
        .send()
        .await
        .expect("Failed to set stock");
    assert_eq!(resp.status(), StatusCode::OK);
}

/// Stock as the admin sees it (the storefront caches product detail).
async fn stock_of(staff: &Client, product_id: &str, variant_id: &str) -> i64 {
    let product: Value = staff
        .get(format!("{}/api/products/{product_id}", admin_url()))
        .send()
        .await
        .expect("Failed to fetch admin product")
        .json()
        .await
        .expect("Invalid admin product");
    product["variants"]
        .as_array()
        .and_then(|variants| variants.iter().find(|v| v["id"] == variant_id))
        .and_then(|v| v["stock_quantity"].as_i64())
        .expect("variant stock")
}

/// Register a customer, put `quantity` of the variant in their cart and
/// check out. Returns the customer client and the pending order ID.
async fn pending_order(variant_id: &str, quantity: i32) -> (Client, String) {
    let customer = session_client();
    register_customer(&customer).await;
    let base = storefront_url();

    let resp = customer
        .post(format!("{base}/api/cart/items"))
        .json(&json!({ "variant_id": variant_id, "quantity": quantity }))
        .send()
        .await
        .expect("Failed to add to cart");
    assert!(resp.status().is_success(), "add to cart: {}", resp.status());

    let started: Value = customer
        .post(format!("{base}/api/checkout"))
        .json(&json!({ "shipping_address": test_address() }))
        .send()
        .await
        .expect("Failed to check out")
        .json()
        .await
        .expect("Invalid checkout response");
    let order_id = started["order_id"].as_str().expect("order id").to_owned();
    (customer, order_id)
}

fn event_id() -> String {
    format!("evt_test_{}", Uuid::new_v4().simple())
}

async fn admin_order(staff: &Client, order_id: &str) -> Value {
    staff
        .get(format!("{}/api/orders/{order_id}", admin_url()))
        .send()
        .await
        .expect("Failed to fetch order")
        .json()
        .await
        .expect("Invalid order")
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers with Stripe test keys and STRIPE_WEBHOOK_SECRET"]
async fn test_redelivered_event_is_applied_once() {
    let staff = staff_client().await;
    let (product_id, variant_id) = first_variant().await;
    set_stock(&staff, &variant_id, 10).await;

    let (customer, order_id) = pending_order(&variant_id, 2).await;
    let payload = checkout_completed_event(&event_id(), &order_id);

    for _ in 0..2 {
        let resp = deliver_event(&payload).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    assert_eq!(stock_of(&staff, &product_id, &variant_id).await, 8);

    let order = admin_order(&staff, &order_id).await;
    assert_eq!(order["status"], "paid");
    assert_eq!(order["stock_conflict"], false);

    let notifications: Value = customer
        .get(format!("{}/api/notifications", storefront_url()))
        .send()
        .await
        .expect("Failed to list notifications")
        .json()
        .await
        .expect("Invalid notifications");
    let placed = notifications["items"]
        .as_array()
        .expect("notification items")
        .iter()
        .filter(|n| n["kind"] == "order_placed" && n["order_id"] == order_id.as_str())
        .count();
    assert_eq!(placed, 1);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers with Stripe test keys and STRIPE_WEBHOOK_SECRET"]
async fn test_second_event_for_paid_order_changes_nothing() {
    let staff = staff_client().await;
    let (product_id, variant_id) = first_variant().await;
    set_stock(&staff, &variant_id, 10).await;

    let (_customer, order_id) = pending_order(&variant_id, 1).await;

    // Two distinct events for the same session: only the first finds the
    // order pending.
    for _ in 0..2 {
        let payload = checkout_completed_event(&event_id(), &order_id);
        assert_eq!(deliver_event(&payload).await.status(), StatusCode::OK);
    }

    assert_eq!(stock_of(&staff, &product_id, &variant_id).await, 9);
    let order = admin_order(&staff, &order_id).await;
    let paid_transitions = order["history"]
        .as_array()
        .expect("history")
        .iter()
        .filter(|change| change["to_status"] == "paid")
        .count();
    assert_eq!(paid_transitions, 1);
}

#[tokio::test]
#[ignore = "Requires running storefront and admin servers with Stripe test keys and STRIPE_WEBHOOK_SECRET"]
async fn test_short_stock_flags_conflict_without_going_negative() {
    let staff = staff_client().await;
    let (product_id, variant_id) = first_variant().await;
    set_stock(&staff, &variant_id, 3).await;

    let (_customer, order_id) = pending_order(&variant_id, 2).await;

    // Stock sold elsewhere between checkout and payment.
    set_stock(&staff, &variant_id, 1).await;

    let payload = checkout_completed_event(&event_id(), &order_id);
    assert_eq!(deliver_event(&payload).await.status(), StatusCode::OK);

    let order = admin_order(&staff, &order_id).await;
    assert_eq!(order["status"], "paid");
    assert_eq!(order["stock_conflict"], true);
    assert_eq!(stock_of(&staff, &product_id, &variant_id).await, 1);
}
