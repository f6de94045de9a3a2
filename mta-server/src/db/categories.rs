//! Categories store

use chrono::{DateTime, Utc};
use mta_common::LocalizedText;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use super::{localized, new_id};

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: String,
    pub slug: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for Category {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            slug: row.try_get("slug")?,
            name: localized(row, "name")?,
            description: localized(row, "description")?,
            position: row.try_get("position")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Category with its published topic count
#[derive(Debug, Clone, Serialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub topic_count: i64,
}

pub struct CategoryInput {
    pub slug: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub position: i64,
}

pub async fn create(pool: &SqlitePool, input: &CategoryInput) -> sqlx::Result<Category> {
    let id = new_id();
    let now = mta_common::time::now();

    sqlx::query(
        r#"
        INSERT INTO categories (id, slug, name_ru, name_ro, description_ru, description_ro, position, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&input.slug)
    .bind(&input.name.ru)
    .bind(&input.name.ro)
    .bind(&input.description.ru)
    .bind(&input.description.ro)
    .bind(input.position)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn update(pool: &SqlitePool, id: &str, input: &CategoryInput) -> sqlx::Result<Option<Category>> {
    let result = sqlx::query(
        r#"
        UPDATE categories
        SET slug = ?, name_ru = ?, name_ro = ?, description_ru = ?, description_ro = ?, position = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.slug)
    .bind(&input.name.ru)
    .bind(&input.name.ro)
    .bind(&input.description.ru)
    .bind(&input.description.ro)
    .bind(input.position)
    .bind(mta_common::time::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get(pool, id).await
}

pub async fn get(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<Category>> {
    sqlx::query_as("SELECT * FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn exists(pool: &SqlitePool, id: &str) -> sqlx::Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Ordered by position, then Romanian name
pub async fn list_with_counts(pool: &SqlitePool) -> sqlx::Result<Vec<CategoryWithCount>> {
    let rows = sqlx::query(
        r#"
        SELECT c.*,
               (SELECT COUNT(*) FROM topics t WHERE t.category_id = c.id AND t.published = 1) AS topic_count
        FROM categories c
        ORDER BY c.position, c.name_ro
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(CategoryWithCount {
                category: Category::from_row(row)?,
                topic_count: row.try_get("topic_count")?,
            })
        })
        .collect()
}

pub async fn topic_count(pool: &SqlitePool, id: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM topics WHERE category_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn delete(pool: &SqlitePool, id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
