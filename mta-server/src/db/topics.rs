//! Topics store and per-user topic progress

use chrono::{DateTime, Utc};
use mta_common::{LocalizedText, Tier};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};
use std::str::FromStr;

use super::{like_pattern, localized, new_id, parsed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicKind {
    Article,
    Protocol,
}

impl TopicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::Article => "article",
            TopicKind::Protocol => "protocol",
        }
    }
}

impl FromStr for TopicKind {
    type Err = mta_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article" => Ok(TopicKind::Article),
            "protocol" => Ok(TopicKind::Protocol),
            other => Err(mta_common::Error::InvalidInput(format!("Unknown topic kind: {}", other))),
        }
    }
}

/// How a piece of content entered the catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Manual,
    Generated,
    Imported,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Manual => "manual",
            Origin::Generated => "generated",
            Origin::Imported => "imported",
        }
    }
}

impl FromStr for Origin {
    type Err = mta_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Origin::Manual),
            "generated" => Ok(Origin::Generated),
            "imported" => Ok(Origin::Imported),
            other => Err(mta_common::Error::InvalidInput(format!("Unknown origin: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Topic {
    pub id: String,
    pub category_id: String,
    pub slug: String,
    pub kind: TopicKind,
    pub title: LocalizedText,
    pub summary: LocalizedText,
    pub body: LocalizedText,
    pub access_level: Tier,
    pub published: bool,
    pub position: i64,
    pub origin: Origin,
    pub source_url: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Topic {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            category_id: row.try_get("category_id")?,
            slug: row.try_get("slug")?,
            kind: parsed(row, "kind")?,
            title: localized(row, "title")?,
            summary: localized(row, "summary")?,
            body: localized(row, "body")?,
            access_level: parsed(row, "access_level")?,
            published: row.try_get("published")?,
            position: row.try_get("position")?,
            origin: parsed(row, "origin")?,
            source_url: row.try_get("source_url")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Writable topic fields
#[derive(Debug, Clone)]
pub struct TopicInput {
    pub category_id: String,
    pub slug: String,
    pub kind: TopicKind,
    pub title: LocalizedText,
    pub summary: LocalizedText,
    pub body: LocalizedText,
    pub access_level: Tier,
    pub position: i64,
    pub source_url: Option<String>,
}

pub async fn create(
    pool: &SqlitePool,
    input: &TopicInput,
    origin: Origin,
    created_by: Option<&str>,
) -> sqlx::Result<Topic> {
    let id = new_id();
    let now = mta_common::time::now();

    sqlx::query(
        r#"
        INSERT INTO topics (
            id, category_id, slug, kind,
            title_ru, title_ro, summary_ru, summary_ro, body_ru, body_ro,
            access_level, published, position, origin, source_url, created_by, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&input.category_id)
    .bind(&input.slug)
    .bind(input.kind.as_str())
    .bind(&input.title.ru)
    .bind(&input.title.ro)
    .bind(&input.summary.ru)
    .bind(&input.summary.ro)
    .bind(&input.body.ru)
    .bind(&input.body.ro)
    .bind(input.access_level.as_str())
    .bind(input.position)
    .bind(origin.as_str())
    .bind(&input.source_url)
    .bind(created_by)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn update(pool: &SqlitePool, id: &str, input: &TopicInput) -> sqlx::Result<Option<Topic>> {
    let result = sqlx::query(
        r#"
        UPDATE topics
        SET category_id = ?, slug = ?, kind = ?,
            title_ru = ?, title_ro = ?, summary_ru = ?, summary_ro = ?, body_ru = ?, body_ro = ?,
            access_level = ?, position = ?, source_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.category_id)
    .bind(&input.slug)
    .bind(input.kind.as_str())
    .bind(&input.title.ru)
    .bind(&input.title.ro)
    .bind(&input.summary.ru)
    .bind(&input.summary.ro)
    .bind(&input.body.ru)
    .bind(&input.body.ro)
    .bind(input.access_level.as_str())
    .bind(input.position)
    .bind(&input.source_url)
    .bind(mta_common::time::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Topic>> {
    sqlx::query_as("SELECT * FROM topics WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id_or_slug(pool: &SqlitePool, key: &str) -> sqlx::Result<Option<Topic>> {
    sqlx::query_as("SELECT * FROM topics WHERE id = ? OR slug = ? LIMIT 1")
        .bind(key)
        .bind(key)
        .fetch_optional(pool)
        .await
}

pub async fn set_published(pool: &SqlitePool, id: &str, published: bool) -> sqlx::Result<Option<Topic>> {
    let result = sqlx::query("UPDATE topics SET published = ?, updated_at = ? WHERE id = ?")
        .bind(published)
        .bind(mta_common::time::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get(pool, id).await
}

pub async fn delete(pool: &SqlitePool, id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM topics WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    pub category_id: Option<String>,
    pub query: Option<String>,
    pub kind: Option<TopicKind>,
    pub include_unpublished: bool,
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &TopicFilter) {
    builder.push(" WHERE 1 = 1");
    if !filter.include_unpublished {
        builder.push(" AND published = 1");
    }
    if let Some(category_id) = &filter.category_id {
        builder.push(" AND category_id = ").push_bind(category_id.clone());
    }
    if let Some(kind) = filter.kind {
        builder.push(" AND kind = ").push_bind(kind.as_str());
    }
    if let Some(q) = &filter.query {
        let pattern = like_pattern(q);
        builder
            .push(r" AND (title_ru LIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR title_ro LIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\')");
    }
}

pub async fn count(pool: &SqlitePool, filter: &TopicFilter) -> sqlx::Result<i64> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM topics");
    push_filters(&mut builder, filter);
    builder.build_query_scalar().fetch_one(pool).await
}

/// Ordered by position, then Romanian title
pub async fn list(pool: &SqlitePool, filter: &TopicFilter, limit: i64, offset: i64) -> sqlx::Result<Vec<Topic>> {
    let mut builder = QueryBuilder::new("SELECT * FROM topics");
    push_filters(&mut builder, filter);
    builder
        .push(" ORDER BY position, title_ro LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    builder.build_query_as().fetch_all(pool).await
}

/// Idempotent; returns the completion time
pub async fn mark_complete(pool: &SqlitePool, user_id: &str, topic_id: &str) -> sqlx::Result<DateTime<Utc>> {
    sqlx::query("INSERT OR IGNORE INTO topic_progress (user_id, topic_id, completed_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(topic_id)
        .bind(mta_common::time::now())
        .execute(pool)
        .await?;

    sqlx::query_scalar("SELECT completed_at FROM topic_progress WHERE user_id = ? AND topic_id = ?")
        .bind(user_id)
        .bind(topic_id)
        .fetch_one(pool)
        .await
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryProgress {
    pub category_id: String,
    pub name: LocalizedText,
    pub completed: i64,
    pub total: i64,
}

/// Completed vs published topics per category
pub async fn progress_by_category(pool: &SqlitePool, user_id: &str) -> sqlx::Result<Vec<CategoryProgress>> {
    let rows = sqlx::query(
        r#"
        SELECT c.id AS category_id, c.name_ru, c.name_ro,
               COUNT(t.id) AS total,
               COUNT(p.topic_id) AS completed
        FROM categories c
        LEFT JOIN topics t ON t.category_id = c.id AND t.published = 1
        LEFT JOIN topic_progress p ON p.topic_id = t.id AND p.user_id = ?
        GROUP BY c.id
        ORDER BY c.position, c.name_ro
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CategoryProgress {
                category_id: row.try_get("category_id")?,
                name: localized(row, "name")?,
                completed: row.try_get("completed")?,
                total: row.try_get("total")?,
            })
        })
        .collect()
}
