//! In-app notifications written by back-office actions.

use sqlx::PgConnection;

use kedai_core::{NotificationKind, OrderId, ProfileId};

use super::RepositoryError;

/// A notification to insert.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub order_id: Option<OrderId>,
}

/// Insert a notification for one profile.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert(
    conn: &mut PgConnection,
    profile_id: ProfileId,
    notification: &NewNotification,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO notifications (profile_id, kind, title, body, link, order_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(profile_id)
    .bind(notification.kind)
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(notification.link.as_deref())
    .bind(notification.order_id)
    .execute(conn)
    .await?;
    Ok(())
}
