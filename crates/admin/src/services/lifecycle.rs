//! Order status lifecycle.
//!
//! Every staff-driven status change goes through [`LifecycleService`]:
//!
//! 1. the transition is checked against [`OrderStatus::can_transition_to`];
//! 2. leaving a paid state for `cancelled`/`refunded` refunds the Stripe
//!    payment intent first (keyed `refund-{order_id}`, so a retry after a
//!    failure cannot refund twice);
//! 3. in one transaction the order row is locked and re-checked, the status
//!    and timestamps are written, stock is returned when the goods never
//!    shipped, an unpaid EasyParcel booking is abandoned, history is
//!    appended and the customer gets an in-app notification;
//! 4. after commit the customer is emailed when SMTP is configured. Email
//!    failures are logged only.

use sqlx::PgPool;
use thiserror::Error;

use kedai_core::{NotificationKind, OrderId, OrderStatus, PaymentStatus, ProfileId};

use crate::db::notifications::{self, NewNotification};
use crate::db::{OrderRepository, RepositoryError, SettingsRepository, orders, shipments};
use crate::services::email::{EmailService, OrderStatusEmail};
use crate::stripe::{StripeClient, StripeError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("order not found")]
    NotFound,

    #[error("cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order has no Stripe payment to refund")]
    MissingPayment,

    #[error("order status changed while processing, reload and retry")]
    Concurrent,

    #[error("refund failed: {0}")]
    Refund(#[from] StripeError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for LifecycleError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// A requested status change.
#[derive(Debug, Clone)]
pub struct StatusChangeRequest<'a> {
    pub order_id: OrderId,
    pub next: OrderStatus,
    pub note: Option<&'a str>,
    /// Staff member making the change; `None` for system actions.
    pub actor: Option<ProfileId>,
}

/// What a status change did.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusChangeOutcome {
    pub order_id: OrderId,
    pub order_number: String,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub refund_id: Option<String>,
    /// Number of variants whose stock was returned.
    pub restocked_variants: u64,
}

/// Check a transition without touching the database.
///
/// # Errors
///
/// Returns `LifecycleError::InvalidTransition` when the state machine forbids it.
pub const fn check_transition(from: OrderStatus, to: OrderStatus) -> Result<(), LifecycleError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition { from, to })
    }
}

/// Title and body of the in-app notification for a status change.
#[must_use]
pub fn notification_text(order_number: &str, to: OrderStatus) -> (String, String) {
    let title = format!("Order {order_number}: {}", to.label());
    let body = match to {
        OrderStatus::Processing => "We're preparing your order.".to_owned(),
        OrderStatus::Shipped => "Your order is on its way.".to_owned(),
        OrderStatus::Delivered => "Your order has been delivered. Enjoy!".to_owned(),
        OrderStatus::Cancelled => "Your order was cancelled. Any payment will be refunded.".to_owned(),
        OrderStatus::Refunded => "Your payment has been refunded.".to_owned(),
        OrderStatus::Pending | OrderStatus::Paid => format!("Status: {}", to.label()),
    };
    (title, body)
}

/// Order status lifecycle service.
pub struct LifecycleService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    email: Option<&'a EmailService>,
}

impl<'a> LifecycleService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        stripe: &'a StripeClient,
        email: Option<&'a EmailService>,
    ) -> Self {
        Self {
            pool,
            stripe,
            email,
        }
    }

    /// Apply a status change with all of its side effects.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::InvalidTransition` for forbidden moves,
    /// `LifecycleError::Refund` if Stripe rejects the refund (nothing is
    /// written), and `LifecycleError::Concurrent` if another change won the
    /// race.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, to = %request.next))]
    pub async fn transition(
        &self,
        request: &StatusChangeRequest<'_>,
    ) -> Result<StatusChangeOutcome, LifecycleError> {
        let snapshot = OrderRepository::new(self.pool)
            .snapshot(request.order_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;
        check_transition(snapshot.status, request.next)?;

        let refund_id = if snapshot.status.refunds_on(request.next) {
            Some(self.refund(&snapshot).await?)
        } else {
            None
        };

        let mut tx = self.pool.begin().await?;

        let order = orders::lock(&mut tx, request.order_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;
        if order.status != snapshot.status {
            if let Some(refund_id) = &refund_id {
                tracing::error!(%refund_id, "Refund issued but order changed concurrently");
            }
            return Err(LifecycleError::Concurrent);
        }

        let from = order.status;
        let to = request.next;
        let payment_status = refund_id.as_ref().map(|_| PaymentStatus::Refunded);
        orders::transition(&mut tx, order.id, to, payment_status, refund_id.as_deref()).await?;

        let restocked_variants = if from.restocks_on(to) {
            orders::restock(&mut tx, order.id).await?
        } else {
            0
        };

        if to.is_terminal() {
            shipments::fail_unpaid(&mut tx, order.id, "order closed before label was paid").await?;
        }

        orders::record_status(&mut tx, order.id, from, to, request.note, request.actor).await?;

        if let Some(profile_id) = order.profile_id {
            let (title, body) = notification_text(&order.order_number, to);
            notifications::insert(
                &mut tx,
                profile_id,
                &NewNotification {
                    kind: NotificationKind::OrderStatus,
                    title,
                    body,
                    link: Some(format!("/account/orders/{}", order.id)),
                    order_id: Some(order.id),
                },
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            order_number = %order.order_number,
            %from,
            %to,
            restocked_variants,
            refunded = refund_id.is_some(),
            "Order status changed"
        );

        self.spawn_email(order.id, to, request.note.map(str::to_owned));

        Ok(StatusChangeOutcome {
            order_id: order.id,
            order_number: order.order_number,
            from,
            to,
            refund_id,
            restocked_variants,
        })
    }

    async fn refund(&self, order: &orders::LockedOrder) -> Result<String, LifecycleError> {
        if let Some(existing) = &order.stripe_refund_id {
            return Ok(existing.clone());
        }
        let payment_intent = order
            .stripe_payment_intent_id
            .as_deref()
            .ok_or(LifecycleError::MissingPayment)?;

        let refund = self
            .stripe
            .refund_payment_intent(order.id, payment_intent)
            .await?;
        Ok(refund.id)
    }

    /// Email the customer in the background.
    fn spawn_email(&self, order_id: OrderId, to: OrderStatus, note: Option<String>) {
        let Some(email) = self.email.cloned() else {
            return;
        };
        let pool = self.pool.clone();

        tokio::spawn(async move {
            if let Err(e) = send_status_email(&pool, &email, order_id, to, note.as_deref()).await {
                tracing::warn!(%order_id, error = %e, "Order status email failed");
            }
        });
    }
}

async fn send_status_email(
    pool: &PgPool,
    email: &EmailService,
    order_id: OrderId,
    to: OrderStatus,
    note: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = SettingsRepository::new(pool).get().await?;
    let Some(order) = OrderRepository::new(pool).detail(order_id).await? else {
        return Ok(());
    };

    let customer_name = order
        .customer
        .as_ref()
        .and_then(|c| c.full_name.as_deref())
        .unwrap_or(&order.shipping_address.recipient_name);
    let shipment = order.shipment.as_ref();

    email
        .send_order_status(
            &order.contact_email,
            &OrderStatusEmail {
                store_name: &settings.store_name,
                customer_name,
                order_number: &order.order_number,
                status_label: to.label(),
                note,
                courier: shipment
                    .and_then(|s| s.courier.as_deref())
                    .unwrap_or("Courier"),
                awb_no: shipment.and_then(|s| s.awb_no.as_deref()),
                tracking_url: shipment.and_then(|s| s.tracking_url.as_deref()),
            },
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_transition() {
        assert!(check_transition(OrderStatus::Paid, OrderStatus::Processing).is_ok());
        assert!(matches!(
            check_transition(OrderStatus::Pending, OrderStatus::Shipped),
            Err(LifecycleError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Shipped
            })
        ));
        assert!(check_transition(OrderStatus::Refunded, OrderStatus::Paid).is_err());
    }

    #[test]
    fn test_notification_text() {
        let (title, body) = notification_text("KD-1", OrderStatus::Shipped);
        assert_eq!(title, "Order KD-1: Shipped");
        assert_eq!(body, "Your order is on its way.");
    }
}
