//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kedai_core::{NotificationId, NotificationKind, OrderId};

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub order_id: Option<OrderId>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
