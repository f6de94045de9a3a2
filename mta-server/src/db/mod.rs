//! Stores: one module per collection, free functions over `&SqlitePool`

pub mod categories;
pub mod chat;
pub mod notifications;
pub mod quizzes;
pub mod resources;
pub mod schedule;
pub mod sessions;
pub mod subscriptions;
pub mod topics;
pub mod users;

use mta_common::locale::MAX_SLUG_LEN;
use mta_common::LocalizedText;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

/// Read `{prefix}_ru` / `{prefix}_ro` into a [`LocalizedText`]
pub(crate) fn localized(row: &SqliteRow, prefix: &str) -> sqlx::Result<LocalizedText> {
    Ok(LocalizedText {
        ru: row.try_get(format!("{}_ru", prefix).as_str())?,
        ro: row.try_get(format!("{}_ro", prefix).as_str())?,
    })
}

/// Read a TEXT column and parse it into an enum
pub(crate) fn parsed<T>(row: &SqliteRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// First free slug of `base`, `base-2`, `base-3`, … in `table`
///
/// `exclude_id` keeps a row's own slug available to it on update.
pub(crate) async fn unique_slug(
    pool: &SqlitePool,
    table: &'static str,
    base: &str,
    exclude_id: Option<&str>,
) -> sqlx::Result<String> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE slug = ? AND id != ?", table);
    let mut candidate = base.to_string();
    let mut suffix = 2;

    loop {
        let taken: i64 = sqlx::query_scalar(&sql)
            .bind(&candidate)
            .bind(exclude_id.unwrap_or(""))
            .fetch_one(pool)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        candidate = with_suffix(base, suffix);
        suffix += 1;
    }
}

/// `base-N`, cutting `base` so the result stays within the slug limit
fn with_suffix(base: &str, suffix: u32) -> String {
    let tail = format!("-{}", suffix);
    let mut end = MAX_SLUG_LEN.saturating_sub(tail.len()).min(base.len());
    while !base.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", base[..end].trim_end_matches('-'), tail)
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
pub(crate) fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_respects_slug_limit() {
        assert_eq!(with_suffix("masaj", 2), "masaj-2");

        let long = "a".repeat(MAX_SLUG_LEN);
        let slug = with_suffix(&long, 12);
        assert_eq!(slug.len(), MAX_SLUG_LEN);
        assert!(slug.ends_with("a-12"));

        // A cut landing on a dash does not double it
        let dashed = format!("{}-bb", "a".repeat(MAX_SLUG_LEN - 3));
        assert_eq!(with_suffix(&dashed, 2), format!("{}-2", "a".repeat(MAX_SLUG_LEN - 3)));
    }

    #[tokio::test]
    async fn test_unique_slug_on_long_base() {
        let pool = mta_common::db::connect_in_memory().await.unwrap();
        let base = "b".repeat(MAX_SLUG_LEN);
        sqlx::query("INSERT INTO categories (id, slug, created_at, updated_at) VALUES ('c1', ?, 'x', 'x')")
            .bind(&base)
            .execute(&pool)
            .await
            .unwrap();

        let slug = unique_slug(&pool, "categories", &base, None).await.unwrap();
        assert_eq!(slug.len(), MAX_SLUG_LEN);
        assert!(slug.ends_with("-2"));

        // The row's own slug stays available to it
        assert_eq!(unique_slug(&pool, "categories", &base, Some("c1")).await.unwrap(), base);
    }

    #[test]
    fn test_like_pattern_escapes() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
