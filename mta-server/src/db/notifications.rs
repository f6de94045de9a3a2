//! Notifications store

use chrono::{DateTime, Utc};
use mta_common::events::NotificationPayload;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use std::str::FromStr;

use super::{new_id, parsed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Message,
    Subscription,
    Schedule,
    Content,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Message => "message",
            NotificationKind::Subscription => "subscription",
            NotificationKind::Schedule => "schedule",
            NotificationKind::Content => "content",
            NotificationKind::System => "system",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = mta_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(NotificationKind::Message),
            "subscription" => Ok(NotificationKind::Subscription),
            "schedule" => Ok(NotificationKind::Schedule),
            "content" => Ok(NotificationKind::Content),
            "system" => Ok(NotificationKind::System),
            other => Err(mta_common::Error::InvalidInput(format!("Unknown notification kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Notification {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            kind: parsed(row, "kind")?,
            title: row.try_get("title")?,
            body: row.try_get("body")?,
            link: row.try_get("link")?,
            read_at: row.try_get("read_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl Notification {
    pub fn payload(&self) -> NotificationPayload {
        NotificationPayload {
            id: Some(self.id.clone()),
            kind: self.kind.as_str().to_string(),
            title: self.title.clone(),
            body: self.body.clone(),
            link: self.link.clone(),
            created_at: self.created_at,
        }
    }
}

pub struct NewNotification<'a> {
    pub user_id: &'a str,
    pub kind: NotificationKind,
    pub title: &'a str,
    pub body: &'a str,
    pub link: Option<&'a str>,
}

pub async fn create(pool: &SqlitePool, new: NewNotification<'_>) -> sqlx::Result<Notification> {
    let id = new_id();
    let now = mta_common::time::now();

    sqlx::query(
        "INSERT INTO notifications (id, user_id, kind, title, body, link, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(new.user_id)
    .bind(new.kind.as_str())
    .bind(new.title)
    .bind(new.body)
    .bind(new.link)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Notification {
        id,
        user_id: new.user_id.to_string(),
        kind: new.kind,
        title: new.title.to_string(),
        body: new.body.to_string(),
        link: new.link.map(str::to_string),
        read_at: None,
        created_at: now,
    })
}

pub async fn count(pool: &SqlitePool, user_id: &str, unread_only: bool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND (? = 0 OR read_at IS NULL)")
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(pool)
        .await
}

/// Newest first
pub async fn list(
    pool: &SqlitePool,
    user_id: &str,
    unread_only: bool,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Notification>> {
    sqlx::query_as(
        r#"
        SELECT * FROM notifications
        WHERE user_id = ? AND (? = 0 OR read_at IS NULL)
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// The owner's notification, marked read; `None` when missing or not owned
pub async fn mark_read(pool: &SqlitePool, id: &str, user_id: &str) -> sqlx::Result<Option<Notification>> {
    sqlx::query("UPDATE notifications SET read_at = COALESCE(read_at, ?) WHERE id = ? AND user_id = ?")
        .bind(mta_common::time::now())
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    sqlx::query_as("SELECT * FROM notifications WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Returns how many were unread
pub async fn mark_all_read(pool: &SqlitePool, user_id: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("UPDATE notifications SET read_at = ? WHERE user_id = ? AND read_at IS NULL")
        .bind(mta_common::time::now())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete(pool: &SqlitePool, id: &str, user_id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
