//! Sessions store (token hashes only)

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::users::User;

pub async fn create(
    pool: &SqlitePool,
    token_hash: &str,
    user_id: &str,
    expires_at: DateTime<Utc>,
) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(token_hash)
        .bind(user_id)
        .bind(mta_common::time::now())
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Session owner and expiry for a token hash
pub async fn find(pool: &SqlitePool, token_hash: &str) -> sqlx::Result<Option<(User, DateTime<Utc>)>> {
    let row: Option<(String, DateTime<Utc>)> =
        sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(pool)
            .await?;

    let Some((user_id, expires_at)) = row else {
        return Ok(None);
    };
    Ok(super::users::find_by_id(pool, &user_id)
        .await?
        .map(|user| (user, expires_at)))
}

pub async fn delete(pool: &SqlitePool, token_hash: &str) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(())
}

/// Revoke every session of a user except `keep`
pub async fn delete_others(pool: &SqlitePool, user_id: &str, keep: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = ? AND token_hash != ?")
        .bind(user_id)
        .bind(keep)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_expired(pool: &SqlitePool, now: DateTime<Utc>) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
