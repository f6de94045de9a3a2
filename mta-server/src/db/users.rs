//! Users store

use chrono::{DateTime, Utc};
use mta_common::security::PasswordHash;
use mta_common::{Locale, Role};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use super::{like_pattern, new_id, parsed};

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub locale: Locale,
    #[serde(skip)]
    pub password: PasswordHash,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for User {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            role: parsed(row, "role")?,
            locale: parsed(row, "locale")?,
            password: PasswordHash {
                hash: row.try_get("password_hash")?,
                salt: row.try_get("password_salt")?,
            },
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub display_name: &'a str,
    pub password: PasswordHash,
    pub role: Role,
    pub locale: Locale,
}

pub async fn create(pool: &SqlitePool, new: NewUser<'_>) -> sqlx::Result<User> {
    let id = new_id();
    let now = mta_common::time::now();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, display_name, password_hash, password_salt, role, locale, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.email)
    .bind(new.display_name)
    .bind(&new.password.hash)
    .bind(&new.password.salt)
    .bind(new.role.as_str())
    .bind(new.locale.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    find_by_id(pool, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn update_profile(
    pool: &SqlitePool,
    id: &str,
    display_name: Option<&str>,
    locale: Option<Locale>,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET display_name = COALESCE(?, display_name),
            locale = COALESCE(?, locale),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(display_name)
    .bind(locale.map(|l| l.as_str()))
    .bind(mta_common::time::now())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_password(pool: &SqlitePool, id: &str, password: &PasswordHash) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET password_hash = ?, password_salt = ?, updated_at = ? WHERE id = ?")
        .bind(&password.hash)
        .bind(&password.salt)
        .bind(mta_common::time::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Returns false when no such user
pub async fn set_role(pool: &SqlitePool, id: &str, role: Role) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(mta_common::time::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &SqlitePool, id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count(pool: &SqlitePool, query: Option<&str>) -> sqlx::Result<i64> {
    match query {
        Some(q) => {
            let pattern = like_pattern(q);
            sqlx::query_scalar(
                r"SELECT COUNT(*) FROM users WHERE email LIKE ? ESCAPE '\' OR display_name LIKE ? ESCAPE '\'",
            )
            .bind(&pattern)
            .bind(&pattern)
            .fetch_one(pool)
            .await
        }
        None => sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(pool).await,
    }
}

/// Newest first
pub async fn list(pool: &SqlitePool, query: Option<&str>, limit: i64, offset: i64) -> sqlx::Result<Vec<User>> {
    match query {
        Some(q) => {
            let pattern = like_pattern(q);
            sqlx::query_as(
                r#"
                SELECT * FROM users
                WHERE email LIKE ? ESCAPE '\' OR display_name LIKE ? ESCAPE '\'
                ORDER BY created_at DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(&pattern)
            .bind(&pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC LIMIT ? OFFSET ?")
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
    }
}

pub async fn admin_ids(pool: &SqlitePool) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar("SELECT id FROM users WHERE role = 'admin' ORDER BY created_at")
        .fetch_all(pool)
        .await
}

pub async fn all_ids(pool: &SqlitePool) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar("SELECT id FROM users ORDER BY created_at")
        .fetch_all(pool)
        .await
}

/// Preferred locale, default when the user is gone
pub async fn locale_of(pool: &SqlitePool, id: &str) -> sqlx::Result<Locale> {
    let raw: Option<String> = sqlx::query_scalar("SELECT locale FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(raw.and_then(|l| l.parse().ok()).unwrap_or_default())
}
