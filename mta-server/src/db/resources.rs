//! Learning resources store (videos, PDFs, links, images)

use chrono::{DateTime, Utc};
use mta_common::{LocalizedText, Tier};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;

use super::{localized, new_id, parsed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Video,
    Pdf,
    Link,
    Image,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Video => "video",
            ResourceKind::Pdf => "pdf",
            ResourceKind::Link => "link",
            ResourceKind::Image => "image",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = mta_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(ResourceKind::Video),
            "pdf" => Ok(ResourceKind::Pdf),
            "link" => Ok(ResourceKind::Link),
            "image" => Ok(ResourceKind::Image),
            other => Err(mta_common::Error::InvalidInput(format!("Unknown resource kind: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub id: String,
    pub topic_id: Option<String>,
    pub kind: ResourceKind,
    pub title: LocalizedText,
    pub url: String,
    pub attribution: Option<String>,
    pub access_level: Tier,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Resource {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            topic_id: row.try_get("topic_id")?,
            kind: parsed(row, "kind")?,
            title: localized(row, "title")?,
            url: row.try_get("url")?,
            attribution: row.try_get("attribution")?,
            access_level: parsed(row, "access_level")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResourceInput {
    pub topic_id: Option<String>,
    pub kind: ResourceKind,
    pub title: LocalizedText,
    pub url: String,
    pub attribution: Option<String>,
    pub access_level: Tier,
}

pub async fn create(pool: &SqlitePool, input: &ResourceInput) -> sqlx::Result<Resource> {
    let id = new_id();

    sqlx::query(
        r#"
        INSERT INTO resources (id, topic_id, kind, title_ru, title_ro, url, attribution, access_level, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&input.topic_id)
    .bind(input.kind.as_str())
    .bind(&input.title.ru)
    .bind(&input.title.ro)
    .bind(&input.url)
    .bind(&input.attribution)
    .bind(input.access_level.as_str())
    .bind(mta_common::time::now())
    .execute(pool)
    .await?;

    get(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn update(pool: &SqlitePool, id: &str, input: &ResourceInput) -> sqlx::Result<Option<Resource>> {
    let result = sqlx::query(
        r#"
        UPDATE resources
        SET topic_id = ?, kind = ?, title_ru = ?, title_ro = ?, url = ?, attribution = ?, access_level = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.topic_id)
    .bind(input.kind.as_str())
    .bind(&input.title.ru)
    .bind(&input.title.ro)
    .bind(&input.url)
    .bind(&input.attribution)
    .bind(input.access_level.as_str())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Resource>> {
    sqlx::query_as("SELECT * FROM resources WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &SqlitePool, id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM resources WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Newest first
pub async fn list(
    pool: &SqlitePool,
    topic_id: Option<&str>,
    kind: Option<ResourceKind>,
) -> sqlx::Result<Vec<Resource>> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM resources WHERE 1 = 1");
    if let Some(topic_id) = topic_id {
        builder.push(" AND topic_id = ").push_bind(topic_id.to_string());
    }
    if let Some(kind) = kind {
        builder.push(" AND kind = ").push_bind(kind.as_str());
    }
    builder.push(" ORDER BY created_at DESC");
    builder.build_query_as().fetch_all(pool).await
}
