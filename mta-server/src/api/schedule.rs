//! Schedule of live classes and registrations

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use mta_common::{LocalizedText, Tier};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::{AdminUser, CurrentUser, Viewer};
use super::{require_text, validate_url};
use crate::db::notifications::NotificationKind;
use crate::db::schedule::{self, EventInput, EventListing, Registration, ScheduleEvent};
use crate::error::{ApiError, ApiResult};
use crate::services::notifier::{self, Notice};
use crate::services::access;
use crate::AppState;

/// Window listed when `to` is omitted
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Event as shown to a viewer; locked events hide `online_url`
#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: String,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online_url: Option<String>,
    pub access_level: Tier,
    pub capacity: Option<i64>,
    pub seats_taken: i64,
    pub registered: bool,
    pub locked: bool,
}

impl EventView {
    fn new(listing: EventListing, viewer: &Viewer) -> Self {
        let event = listing.event;
        let locked = !viewer.can_access(event.access_level);
        Self {
            online_url: if locked { None } else { event.online_url },
            id: event.id,
            title: event.title,
            description: event.description,
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            location: event.location,
            access_level: event.access_level,
            capacity: event.capacity,
            seats_taken: listing.seats_taken,
            registered: listing.registered,
            locked,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// GET /api/schedule
pub async fn list(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Json<Vec<EventView>>> {
    let from = range.from.unwrap_or_else(mta_common::time::now);
    let to = range.to.unwrap_or(from + Duration::days(DEFAULT_WINDOW_DAYS));
    if to <= from {
        return Err(ApiError::BadRequest("to must be after from".to_string()));
    }

    let items = schedule::list_range(&state.db, from, to, viewer.user_id())
        .await?
        .into_iter()
        .map(|listing| EventView::new(listing, &viewer))
        .collect();
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub title: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub online_url: Option<String>,
    #[serde(default)]
    pub access_level: Tier,
    pub capacity: Option<i64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn to_input(req: EventRequest) -> ApiResult<EventInput> {
    let title = require_text("title", &req.title)?;
    if req.ends_at <= req.starts_at {
        return Err(ApiError::BadRequest("ends_at must be after starts_at".to_string()));
    }
    if matches!(req.capacity, Some(c) if c < 1) {
        return Err(ApiError::BadRequest("capacity must be at least 1".to_string()));
    }
    let online_url = non_empty(req.online_url).as_deref().map(validate_url).transpose()?;

    Ok(EventInput {
        title,
        description: req.description.trimmed(),
        starts_at: req.starts_at,
        ends_at: req.ends_at,
        location: non_empty(req.location),
        online_url,
        access_level: req.access_level,
        capacity: req.capacity,
    })
}

/// POST /api/schedule
pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<EventRequest>,
) -> ApiResult<(StatusCode, Json<ScheduleEvent>)> {
    let event = schedule::create(&state.db, &to_input(req)?).await?;
    info!("Event {} scheduled at {} by {}", event.id, event.starts_at, admin.user.id);
    Ok((StatusCode::CREATED, Json(event)))
}

/// PUT /api/schedule/:id
pub async fn update(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<EventRequest>,
) -> ApiResult<Json<ScheduleEvent>> {
    let input = to_input(req)?;
    schedule::update(&state.db, &id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Event not found: {}", id)))
}

fn cancellation_notice(event: &ScheduleEvent) -> Notice {
    let date = event.starts_at.format("%Y-%m-%d %H:%M UTC");
    Notice::new(
        NotificationKind::Schedule,
        LocalizedText::new(
            format!("Занятие отменено: {}", event.title.ru),
            format!("Ședință anulată: {}", event.title.ro),
        ),
        LocalizedText::new(
            format!("Занятие {} не состоится.", date),
            format!("Ședința din {} nu va avea loc.", date),
        ),
    )
    .with_link("/schedule")
}

/// DELETE /api/schedule/:id
pub async fn delete(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let event = schedule::get(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Event not found: {}", id)))?;
    let registrants = schedule::registrant_ids(&state.db, &id).await?;

    if !schedule::delete(&state.db, &id).await? {
        return Err(ApiError::NotFound(format!("Event not found: {}", id)));
    }
    let notified = notifier::send_many(&state, &registrants, &cancellation_notice(&event)).await?;
    info!("Event {} cancelled by {}, {} registrants notified", id, admin.user.id, notified);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub event_id: String,
    pub registered: bool,
    pub seats_taken: i64,
}

/// POST /api/schedule/:id/register
pub async fn register(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<RegistrationResponse>> {
    let event = schedule::get(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Event not found: {}", id)))?;
    access::ensure_access(session.tier, event.access_level)?;
    if event.starts_at <= mta_common::time::now() {
        return Err(ApiError::BadRequest("Event has already started".to_string()));
    }

    match schedule::register(&state.db, &event, &session.user.id).await? {
        Registration::Full => return Err(ApiError::Conflict("Event is full".to_string())),
        Registration::Created => info!("User {} registered for event {}", session.user.id, id),
        Registration::AlreadyRegistered => {}
    }

    Ok(Json(RegistrationResponse {
        seats_taken: schedule::seats_taken(&state.db, &id).await?,
        event_id: id,
        registered: true,
    }))
}

/// DELETE /api/schedule/:id/register
pub async fn unregister(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<RegistrationResponse>> {
    if schedule::get(&state.db, &id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Event not found: {}", id)));
    }
    schedule::unregister(&state.db, &id, &session.user.id).await?;

    Ok(Json(RegistrationResponse {
        seats_taken: schedule::seats_taken(&state.db, &id).await?,
        event_id: id,
        registered: false,
    }))
}

pub fn schedule_routes() -> Router<AppState> {
    Router::new()
        .route("/api/schedule", get(list).post(create))
        .route("/api/schedule/:id", put(update).delete(delete))
        .route("/api/schedule/:id/register", post(register).delete(unregister))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(hours: i64, capacity: Option<i64>) -> EventRequest {
        let starts_at = mta_common::time::now() + Duration::days(1);
        EventRequest {
            title: LocalizedText::new("Массаж спины", "Masajul spatelui"),
            description: LocalizedText::default(),
            starts_at,
            ends_at: starts_at + Duration::hours(hours),
            location: Some("  ".to_string()),
            online_url: None,
            access_level: Tier::Basic,
            capacity,
        }
    }

    #[test]
    fn test_event_validation() {
        let input = to_input(request(2, Some(10))).unwrap();
        assert_eq!(input.location, None);

        assert!(to_input(request(0, None)).is_err());
        assert!(to_input(request(2, Some(0))).is_err());
    }
}
