//! Notification inbox and announcements

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use mta_common::{Locale, LocalizedText};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::{AdminUser, CurrentUser};
use super::{require_text, validate_url};
use crate::db::notifications::{self, Notification, NotificationKind};
use crate::db::users;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageParams};
use crate::services::notifier::{self, Notice};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// GET /api/notifications
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(query): Query<InboxQuery>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<Notification>>> {
    let user_id = &session.user.id;
    let total = notifications::count(&state.db, user_id, query.unread_only).await?;
    let pagination = page.paginate(total);
    let items = notifications::list(
        &state.db,
        user_id,
        query.unread_only,
        pagination.per_page,
        pagination.offset,
    )
    .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Json<UnreadCount>> {
    let unread = notifications::count(&state.db, &session.user.id, true).await?;
    Ok(Json(UnreadCount { unread }))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    notifications::mark_read(&state.db, &id, &session.user.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Notification not found: {}", id)))
}

#[derive(Debug, Serialize)]
pub struct ReadAllResponse {
    pub updated: u64,
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> ApiResult<Json<ReadAllResponse>> {
    let updated = notifications::mark_all_read(&state.db, &session.user.id).await?;
    Ok(Json(ReadAllResponse { updated }))
}

/// DELETE /api/notifications/:id
pub async fn remove(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !notifications::delete(&state.db, &id, &session.user.id).await? {
        return Err(ApiError::NotFound(format!("Notification not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    pub title: LocalizedText,
    pub body: LocalizedText,
    pub link: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnnouncementResponse {
    pub stored: usize,
    pub delivered: usize,
}

/// POST /api/admin/announcements
///
/// Stored for every user, delivered live once through the broadcast room.
pub async fn announce(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<AnnouncementRequest>,
) -> ApiResult<(StatusCode, Json<AnnouncementResponse>)> {
    let title = require_text("title", &req.title)?;
    let body = require_text("body", &req.body)?;
    let link = match req.link.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        // In-app paths are accepted as they are
        Some(path) if path.starts_with('/') => Some(path.to_string()),
        Some(url) => Some(validate_url(url)?),
        None => None,
    };

    let mut notice = Notice::new(NotificationKind::System, title, body);
    notice.link = link;

    let recipients = users::all_ids(&state.db).await?;
    let stored = notifier::store_for_all(&state, &recipients, &notice).await?;

    let locale = Locale::default();
    let delivered = notifier::broadcast(
        &state,
        notice.kind,
        notice.title.get(locale),
        notice.body.get(locale),
        notice.link.as_deref(),
    );
    info!(
        "Announcement by {} stored for {} users, delivered to {} connections",
        admin.user.id, stored, delivered
    );

    Ok((StatusCode::CREATED, Json(AnnouncementResponse { stored, delivered })))
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/notifications/:id/read", post(mark_read))
        .route("/api/notifications/:id", delete(remove))
        .route("/api/admin/announcements", post(announce))
}
