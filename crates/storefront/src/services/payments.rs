//! Stripe webhook processing.
//!
//! Each event is handled in a single transaction that also records the event
//! ID, so a redelivered event is either skipped or has no partial effects.
//! Materializing a paid order locks the order row and only proceeds while it
//! is still `pending`; stock is taken with guarded updates that never go
//! below zero.

use sqlx::PgPool;
use thiserror::Error;

use kedai_core::{NotificationKind, OrderId, OrderStatus, StoreSettings};

use crate::db::notifications::{self, NewNotification};
use crate::db::{RepositoryError, cart, orders, webhooks};
use crate::stripe::{Event, EventObject};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// A variant whose stock needs staff attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAlert {
    pub sku: String,
    /// Remaining stock, or `None` if the decrement could not be applied.
    pub remaining: Option<i32>,
}

/// What processing an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event ID was already recorded.
    Duplicate,
    /// Event type the storefront does not act on.
    Ignored,
    /// Session completed but payment is still pending (async methods).
    AwaitingPayment,
    /// No order matches the event's reference.
    UnknownOrder,
    /// The order had already left `pending`.
    NotPending(OrderStatus),
    Paid {
        order_number: String,
        alerts: Vec<StockAlert>,
        stock_conflict: bool,
    },
    Cancelled,
}

enum Action {
    Materialize,
    Fail(&'static str),
    Ignore,
}

fn action_for(event_type: &str) -> Action {
    match event_type {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            Action::Materialize
        }
        "checkout.session.expired" => Action::Fail("checkout session expired"),
        "checkout.session.async_payment_failed" => Action::Fail("payment failed"),
        _ => Action::Ignore,
    }
}

/// Webhook event processor.
pub struct PaymentService<'a> {
    pool: &'a PgPool,
    settings: &'a StoreSettings,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, settings: &'a StoreSettings) -> Self {
        Self { pool, settings }
    }

    /// Process a verified event.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` only for database failures; the caller should
    /// answer 5xx so Stripe redelivers.
    #[tracing::instrument(skip_all, fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn handle(&self, event: &Event) -> Result<WebhookOutcome, PaymentError> {
        let mut tx = self.pool.begin().await?;

        if !webhooks::record(&mut tx, &event.id, &event.event_type).await? {
            tracing::info!("Duplicate Stripe event");
            return Ok(WebhookOutcome::Duplicate);
        }

        let object = event.object();
        let outcome = match action_for(&event.event_type) {
            Action::Ignore => WebhookOutcome::Ignored,
            Action::Materialize if !object.is_paid() => WebhookOutcome::AwaitingPayment,
            Action::Materialize => match order_id(object) {
                Some(order_id) => self.materialize(&mut tx, order_id, object).await?,
                None => WebhookOutcome::UnknownOrder,
            },
            Action::Fail(note) => match order_id(object) {
                Some(order_id) => {
                    if orders::fail_pending(&mut tx, order_id, note).await? {
                        WebhookOutcome::Cancelled
                    } else {
                        WebhookOutcome::Ignored
                    }
                }
                None => WebhookOutcome::UnknownOrder,
            },
        };

        tx.commit().await?;

        match &outcome {
            WebhookOutcome::UnknownOrder => {
                tracing::warn!(reference = ?object.order_reference(), "Webhook for unknown order");
            }
            WebhookOutcome::Paid {
                order_number,
                stock_conflict,
                ..
            } => {
                if *stock_conflict {
                    tracing::warn!(%order_number, "Order paid with stock conflict");
                } else {
                    tracing::info!(%order_number, "Order paid");
                }
            }
            other => tracing::info!(outcome = ?other, "Stripe event processed"),
        }

        Ok(outcome)
    }

    async fn materialize(
        &self,
        conn: &mut sqlx::PgConnection,
        order_id: OrderId,
        object: &EventObject,
    ) -> Result<WebhookOutcome, PaymentError> {
        let Some(order) = orders::lock(conn, order_id).await? else {
            return Ok(WebhookOutcome::UnknownOrder);
        };
        if order.status != OrderStatus::Pending {
            return Ok(WebhookOutcome::NotPending(order.status));
        }

        let session_id = object.id.as_deref().unwrap_or_default();
        orders::mark_paid(conn, order_id, session_id, object.payment_intent.as_deref()).await?;

        let threshold = self.settings.low_stock_threshold;
        let mut alerts = Vec::new();
        let mut stock_conflict = false;
        let mut purchased = Vec::new();

        for line in orders::stock_lines(conn, order_id).await? {
            let Some(variant_id) = line.variant_id else {
                stock_conflict = true;
                alerts.push(StockAlert {
                    sku: line.sku,
                    remaining: None,
                });
                continue;
            };
            purchased.push(variant_id);

            match orders::decrement_stock(conn, line.id, variant_id, line.quantity).await? {
                Some(remaining) if remaining <= threshold => alerts.push(StockAlert {
                    sku: line.sku,
                    remaining: Some(remaining),
                }),
                Some(_) => {}
                None => {
                    stock_conflict = true;
                    alerts.push(StockAlert {
                        sku: line.sku,
                        remaining: None,
                    });
                }
            }
        }

        if stock_conflict {
            orders::flag_stock_conflict(conn, order_id).await?;
        }

        if let Some(profile_id) = order.profile_id {
            cart::remove_variants(conn, profile_id, &purchased).await?;
            notifications::insert(
                conn,
                profile_id,
                &NewNotification {
                    kind: NotificationKind::OrderPlaced,
                    title: format!("Order {} confirmed", order.order_number),
                    body: "We have received your payment and will prepare your order shortly."
                        .to_owned(),
                    link: Some(format!("/account/orders/{order_id}")),
                    order_id: Some(order_id),
                },
            )
            .await?;
        }

        for alert in &alerts {
            notifications::insert_for_staff(conn, &stock_alert(alert, &order.order_number, order_id))
                .await?;
        }

        Ok(WebhookOutcome::Paid {
            order_number: order.order_number,
            alerts,
            stock_conflict,
        })
    }
}

fn order_id(object: &EventObject) -> Option<OrderId> {
    object.order_reference()?.parse().ok()
}

fn stock_alert(alert: &StockAlert, order_number: &str, order_id: OrderId) -> NewNotification {
    let (title, body) = match alert.remaining {
        Some(remaining) => (
            format!("Low stock: {}", alert.sku),
            format!("{} has {remaining} left after order {order_number}.", alert.sku),
        ),
        None => (
            format!("Stock conflict: {}", alert.sku),
            format!(
                "Order {order_number} was paid but {} could not be taken from stock.",
                alert.sku
            ),
        ),
    };
    NewNotification {
        kind: NotificationKind::StockAlert,
        title,
        body,
        link: Some(format!("/orders/{order_id}")),
        order_id: Some(order_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_routing() {
        assert!(matches!(
            action_for("checkout.session.completed"),
            Action::Materialize
        ));
        assert!(matches!(
            action_for("checkout.session.async_payment_succeeded"),
            Action::Materialize
        ));
        assert!(matches!(
            action_for("checkout.session.expired"),
            Action::Fail(_)
        ));
        assert!(matches!(
            action_for("checkout.session.async_payment_failed"),
            Action::Fail(_)
        ));
        assert!(matches!(action_for("charge.refunded"), Action::Ignore));
    }

    #[test]
    fn test_order_id_from_event_object() {
        let id = OrderId::generate();
        let mut object = EventObject::default();
        object.metadata.insert("order_id".to_owned(), id.to_string());
        assert_eq!(order_id(&object), Some(id));

        object.metadata.insert("order_id".to_owned(), "not-a-uuid".to_owned());
        assert_eq!(order_id(&object), None);

        assert_eq!(order_id(&EventObject::default()), None);
    }

    #[test]
    fn test_stock_alert_messages() {
        let id = OrderId::generate();
        let low = stock_alert(
            &StockAlert {
                sku: "KOPI-250".to_owned(),
                remaining: Some(2),
            },
            "KD-20250101-ABCDEF",
            id,
        );
        assert_eq!(low.kind, NotificationKind::StockAlert);
        assert_eq!(low.title, "Low stock: KOPI-250");
        assert!(low.body.contains("2 left"));

        let conflict = stock_alert(
            &StockAlert {
                sku: "KOPI-250".to_owned(),
                remaining: None,
            },
            "KD-20250101-ABCDEF",
            id,
        );
        assert!(conflict.title.starts_with("Stock conflict"));
    }
}
