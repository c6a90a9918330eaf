//! In-app notifications for customers and staff.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use kedai_core::{NotificationId, NotificationKind, OrderId, PageRequest, Paginated, ProfileId};

use super::RepositoryError;
use crate::models::Notification;

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: NotificationId,
    kind: NotificationKind,
    title: String,
    body: String,
    link: Option<String>,
    order_id: Option<OrderId>,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            title: row.title,
            body: row.body,
            link: row.link,
            order_id: row.order_id,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

/// A notification to insert.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub order_id: Option<OrderId>,
}

/// Repository for notification database operations.
pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The profile's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        profile_id: ProfileId,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Paginated<Notification>, RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM notifications
            WHERE profile_id = $1 AND (NOT $2 OR read_at IS NULL)
            ",
        )
        .bind(profile_id)
        .bind(unread_only)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, NotificationRow>(
            r"
            SELECT id, kind, title, body, link, order_id, read_at, created_at
            FROM notifications
            WHERE profile_id = $1 AND (NOT $2 OR read_at IS NULL)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(profile_id)
        .bind(unread_only)
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

    /// Number of unread notifications.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self, profile_id: ProfileId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE profile_id = $1 AND read_at IS NULL",
        )
        .bind(profile_id)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Mark one notification read. Already-read notifications keep their timestamp.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the notification is not the profile's.
    pub async fn mark_read(
        &self,
        profile_id: ProfileId,
        id: NotificationId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE notifications SET read_at = COALESCE(read_at, now())
            WHERE id = $1 AND profile_id = $2
            ",
        )
        .bind(id)
        .bind(profile_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Mark every unread notification read. Returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_all_read(&self, profile_id: ProfileId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = now() WHERE profile_id = $1 AND read_at IS NULL",
        )
        .bind(profile_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
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

/// Insert the same notification for every staff and admin profile.
///
/// Returns the number of recipients.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn insert_for_staff(
    conn: &mut PgConnection,
    notification: &NewNotification,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        r"
        INSERT INTO notifications (profile_id, kind, title, body, link, order_id)
        SELECT id, $1, $2, $3, $4, $5
        FROM profiles
        WHERE role IN ('staff', 'admin')
        ",
    )
    .bind(notification.kind)
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(notification.link.as_deref())
    .bind(notification.order_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}
