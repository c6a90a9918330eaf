//! Notification routes. All require login.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use kedai_core::{NotificationId, PageRequest, Paginated};

use crate::db::NotificationRepository;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::Notification;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ListQuery {
    fn page(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(defaults.page),
            self.per_page.unwrap_or(defaults.per_page),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct Updated {
    pub updated: u64,
}

/// `GET /api/notifications`
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Notification>>> {
    let page = NotificationRepository::new(state.pool())
        .list(user.id, query.unread, query.page())
        .await?;
    Ok(Json(page))
}

/// `GET /api/notifications/unread-count`
pub async fn unread_count(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UnreadCount>> {
    let unread = NotificationRepository::new(state.pool())
        .unread_count(user.id)
        .await?;
    Ok(Json(UnreadCount { unread }))
}

/// `POST /api/notifications/{id}/read`
pub async fn mark_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode> {
    NotificationRepository::new(state.pool())
        .mark_read(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/notifications/read-all`
pub async fn mark_all_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Updated>> {
    let updated = NotificationRepository::new(state.pool())
        .mark_all_read(user.id)
        .await?;
    Ok(Json(Updated { updated }))
}
