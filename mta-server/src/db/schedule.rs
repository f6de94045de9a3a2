//! Schedule events and registrations

use chrono::{DateTime, Utc};
use mta_common::{LocalizedText, Tier};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use super::{localized, new_id, parsed};

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleEvent {
    pub id: String,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub online_url: Option<String>,
    pub access_level: Tier,
    pub capacity: Option<i64>,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for ScheduleEvent {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            title: localized(row, "title")?,
            description: localized(row, "description")?,
            starts_at: row.try_get("starts_at")?,
            ends_at: row.try_get("ends_at")?,
            location: row.try_get("location")?,
            online_url: row.try_get("online_url")?,
            access_level: parsed(row, "access_level")?,
            capacity: row.try_get("capacity")?,
            reminder_sent: row.try_get("reminder_sent")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EventInput {
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location: Option<String>,
    pub online_url: Option<String>,
    pub access_level: Tier,
    pub capacity: Option<i64>,
}

pub async fn create(pool: &SqlitePool, input: &EventInput) -> sqlx::Result<ScheduleEvent> {
    let id = new_id();
    let now = mta_common::time::now();

    sqlx::query(
        r#"
        INSERT INTO schedule_events (
            id, title_ru, title_ro, description_ru, description_ro, starts_at, ends_at,
            location, online_url, access_level, capacity, reminder_sent, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&input.title.ru)
    .bind(&input.title.ro)
    .bind(&input.description.ru)
    .bind(&input.description.ro)
    .bind(input.starts_at)
    .bind(input.ends_at)
    .bind(&input.location)
    .bind(&input.online_url)
    .bind(input.access_level.as_str())
    .bind(input.capacity)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Moving the start time re-arms the reminder
pub async fn update(pool: &SqlitePool, id: &str, input: &EventInput) -> sqlx::Result<Option<ScheduleEvent>> {
    let result = sqlx::query(
        r#"
        UPDATE schedule_events
        SET title_ru = ?, title_ro = ?, description_ru = ?, description_ro = ?,
            reminder_sent = CASE WHEN starts_at = ? THEN reminder_sent ELSE 0 END,
            starts_at = ?, ends_at = ?, location = ?, online_url = ?,
            access_level = ?, capacity = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title.ru)
    .bind(&input.title.ro)
    .bind(&input.description.ru)
    .bind(&input.description.ro)
    .bind(input.starts_at)
    .bind(input.starts_at)
    .bind(input.ends_at)
    .bind(&input.location)
    .bind(&input.online_url)
    .bind(input.access_level.as_str())
    .bind(input.capacity)
    .bind(mta_common::time::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<ScheduleEvent>> {
    sqlx::query_as("SELECT * FROM schedule_events WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &SqlitePool, id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM schedule_events WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Event with the viewer's registration state
#[derive(Debug, Clone, Serialize)]
pub struct EventListing {
    #[serde(flatten)]
    pub event: ScheduleEvent,
    pub seats_taken: i64,
    pub registered: bool,
}

/// Events starting in `[from, to)`, soonest first
pub async fn list_range(
    pool: &SqlitePool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    viewer_id: Option<&str>,
) -> sqlx::Result<Vec<EventListing>> {
    let rows = sqlx::query(
        r#"
        SELECT e.*,
               (SELECT COUNT(*) FROM schedule_registrations r WHERE r.event_id = e.id) AS seats_taken,
               EXISTS (SELECT 1 FROM schedule_registrations r WHERE r.event_id = e.id AND r.user_id = ?) AS registered
        FROM schedule_events e
        WHERE e.starts_at >= ? AND e.starts_at < ?
        ORDER BY e.starts_at
        "#,
    )
    .bind(viewer_id.unwrap_or(""))
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(EventListing {
                event: ScheduleEvent::from_row(row)?,
                seats_taken: row.try_get("seats_taken")?,
                registered: row.try_get("registered")?,
            })
        })
        .collect()
}

pub async fn seats_taken(pool: &SqlitePool, event_id: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM schedule_registrations WHERE event_id = ?")
        .bind(event_id)
        .fetch_one(pool)
        .await
}

pub async fn is_registered(pool: &SqlitePool, event_id: &str, user_id: &str) -> sqlx::Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM schedule_registrations WHERE event_id = ? AND user_id = ?")
            .bind(event_id)
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    AlreadyRegistered,
    Full,
}

/// Register unless the event is full
///
/// The capacity check and the insert are one statement, so two concurrent
/// registrations cannot both take the last seat.
pub async fn register(
    pool: &SqlitePool,
    event: &ScheduleEvent,
    user_id: &str,
) -> sqlx::Result<Registration> {
    if is_registered(pool, &event.id, user_id).await? {
        return Ok(Registration::AlreadyRegistered);
    }

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO schedule_registrations (event_id, user_id, created_at)
        SELECT ?, ?, ?
        WHERE ? IS NULL
           OR (SELECT COUNT(*) FROM schedule_registrations WHERE event_id = ?) < ?
        "#,
    )
    .bind(&event.id)
    .bind(user_id)
    .bind(mta_common::time::now())
    .bind(event.capacity)
    .bind(&event.id)
    .bind(event.capacity)
    .execute(pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(Registration::Created);
    }
    if is_registered(pool, &event.id, user_id).await? {
        Ok(Registration::AlreadyRegistered)
    } else {
        Ok(Registration::Full)
    }
}

pub async fn unregister(pool: &SqlitePool, event_id: &str, user_id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM schedule_registrations WHERE event_id = ? AND user_id = ?")
        .bind(event_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn registrant_ids(pool: &SqlitePool, event_id: &str) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar("SELECT user_id FROM schedule_registrations WHERE event_id = ? ORDER BY created_at")
        .bind(event_id)
        .fetch_all(pool)
        .await
}

/// Events starting in `(now, now + lead]` whose reminder is still pending
pub async fn due_reminders(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    lead_minutes: i64,
) -> sqlx::Result<Vec<ScheduleEvent>> {
    sqlx::query_as(
        r#"
        SELECT * FROM schedule_events
        WHERE reminder_sent = 0 AND starts_at > ? AND starts_at <= ?
        ORDER BY starts_at
        "#,
    )
    .bind(now)
    .bind(now + chrono::Duration::minutes(lead_minutes))
    .fetch_all(pool)
    .await
}

/// Claim an event's reminder; false when another worker already did
pub async fn claim_reminder(pool: &SqlitePool, event_id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE schedule_events SET reminder_sent = 1 WHERE id = ? AND reminder_sent = 0")
        .bind(event_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
