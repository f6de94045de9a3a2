//! Runtime settings (key/value `settings` table)
//!
//! Database-first configuration: missing values are written back with their
//! built-in defaults on startup so the table documents what is in effect.

use crate::{Error, Result};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{info, warn};

pub const QUIZ_PASS_PERCENT: &str = "quiz_pass_percent";
pub const SESSION_TTL_HOURS: &str = "session_ttl_hours";
pub const GENERATOR_MODEL: &str = "generator_model";
pub const GENERATOR_MAX_TOKENS: &str = "generator_max_tokens";
pub const SCHEDULE_REMINDER_MINUTES: &str = "schedule_reminder_minutes";
pub const MAINTENANCE_INTERVAL_SECS: &str = "maintenance_interval_secs";
pub const CHAT_MAX_MESSAGE_LEN: &str = "chat_max_message_len";

/// Built-in defaults
const DEFAULTS: &[(&str, &str)] = &[
    (QUIZ_PASS_PERCENT, "70"),
    (SESSION_TTL_HOURS, "720"),
    (GENERATOR_MODEL, "claude-sonnet-4-5"),
    (GENERATOR_MAX_TOKENS, "4096"),
    (SCHEDULE_REMINDER_MINUTES, "60"),
    (MAINTENANCE_INTERVAL_SECS, "60"),
    (CHAT_MAX_MESSAGE_LEN, "4000"),
];

/// Read and parse a setting; `None` when missing or NULL
pub async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value.flatten() {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid value for setting '{}': {}", key, e))),
        None => Ok(None),
    }
}

/// Write a setting (insert or replace)
pub async fn set_setting<T: ToString>(db: &SqlitePool, key: &str, value: T) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?, ?, ?)")
        .bind(key)
        .bind(value.to_string())
        .bind(crate::time::now())
        .execute(db)
        .await?;
    Ok(())
}

/// Write the default when the key is missing or NULL
pub async fn ensure_setting(db: &SqlitePool, key: &str, default: &str) -> Result<()> {
    let existing: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    if existing.flatten().is_none() {
        info!("Setting '{}' not found, initializing with default: {}", key, default);
        set_setting(db, key, default).await?;
    }
    Ok(())
}

/// Ensure every built-in default exists
pub async fn init_default_settings(db: &SqlitePool) -> Result<()> {
    for (key, default) in DEFAULTS {
        ensure_setting(db, key, default).await?;
    }
    Ok(())
}

/// Read a setting, falling back to `default` when missing or unparsable
pub async fn get_or<T>(db: &SqlitePool, key: &str, default: T) -> Result<T>
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match get_setting::<T>(db, key).await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(default),
        Err(Error::Config(msg)) => {
            warn!("{} (using default {})", msg, default);
            Ok(default)
        }
        Err(e) => Err(e),
    }
}

/// Typed snapshot of the runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub quiz_pass_percent: u8,
    pub session_ttl_hours: i64,
    pub generator_model: String,
    pub generator_max_tokens: u32,
    pub schedule_reminder_minutes: i64,
    pub maintenance_interval_secs: u64,
    pub chat_max_message_len: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            quiz_pass_percent: 70,
            session_ttl_hours: 720,
            generator_model: "claude-sonnet-4-5".to_string(),
            generator_max_tokens: 4096,
            schedule_reminder_minutes: 60,
            maintenance_interval_secs: 60,
            chat_max_message_len: 4000,
        }
    }
}

impl RuntimeSettings {
    pub async fn load(db: &SqlitePool) -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            quiz_pass_percent: get_or(db, QUIZ_PASS_PERCENT, d.quiz_pass_percent).await?.min(100),
            session_ttl_hours: get_or(db, SESSION_TTL_HOURS, d.session_ttl_hours).await?.max(1),
            generator_model: get_or(db, GENERATOR_MODEL, d.generator_model).await?,
            generator_max_tokens: get_or(db, GENERATOR_MAX_TOKENS, d.generator_max_tokens).await?,
            schedule_reminder_minutes: get_or(db, SCHEDULE_REMINDER_MINUTES, d.schedule_reminder_minutes)
                .await?,
            maintenance_interval_secs: get_or(db, MAINTENANCE_INTERVAL_SECS, d.maintenance_interval_secs)
                .await?
                .max(1),
            chat_max_message_len: get_or(db, CHAT_MAX_MESSAGE_LEN, d.chat_max_message_len).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_written() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        let value: Option<u32> = get_setting(&pool, QUIZ_PASS_PERCENT).await.unwrap();
        assert_eq!(value, Some(70));
        assert_eq!(RuntimeSettings::load(&pool).await.unwrap(), RuntimeSettings::default());
    }

    #[tokio::test]
    async fn test_ensure_does_not_overwrite() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        set_setting(&pool, SESSION_TTL_HOURS, 24).await.unwrap();
        init_default_settings(&pool).await.unwrap();
        let ttl: Option<i64> = get_setting(&pool, SESSION_TTL_HOURS).await.unwrap();
        assert_eq!(ttl, Some(24));
    }

    #[tokio::test]
    async fn test_unparsable_falls_back() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        set_setting(&pool, QUIZ_PASS_PERCENT, "lots").await.unwrap();
        assert!(get_setting::<u8>(&pool, QUIZ_PASS_PERCENT).await.is_err());
        assert_eq!(get_or(&pool, QUIZ_PASS_PERCENT, 70u8).await.unwrap(), 70);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        let value: Option<String> = get_setting(&pool, "nope").await.unwrap();
        assert!(value.is_none());
    }
}
