//! Database initialization
//!
//! Opens (or creates) the SQLite database and brings the schema up to date:
//! 1. `CREATE TABLE IF NOT EXISTS` for every table
//! 2. Versioned migrations
//! 3. Default settings and subscription plans

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    prepare(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// The pool is pinned to one connection that never expires, since every
/// SQLite `:memory:` connection is a separate database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    prepare(&pool).await?;
    Ok(pool)
}

async fn prepare(pool: &SqlitePool) -> Result<()> {
    init_schema(pool).await?;
    crate::db::migrations::run_migrations(pool).await?;
    crate::db::settings::init_default_settings(pool).await?;
    seed_default_plans(pool).await?;
    Ok(())
}

/// Create every table and index (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        password_salt TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'student',
        locale TEXT NOT NULL DEFAULT 'ro',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        token_hash TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id TEXT PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE,
        name_ru TEXT NOT NULL DEFAULT '',
        name_ro TEXT NOT NULL DEFAULT '',
        description_ru TEXT NOT NULL DEFAULT '',
        description_ro TEXT NOT NULL DEFAULT '',
        position INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS topics (
        id TEXT PRIMARY KEY,
        category_id TEXT NOT NULL REFERENCES categories(id),
        slug TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL DEFAULT 'article',
        title_ru TEXT NOT NULL DEFAULT '',
        title_ro TEXT NOT NULL DEFAULT '',
        summary_ru TEXT NOT NULL DEFAULT '',
        summary_ro TEXT NOT NULL DEFAULT '',
        body_ru TEXT NOT NULL DEFAULT '',
        body_ro TEXT NOT NULL DEFAULT '',
        access_level TEXT NOT NULL DEFAULT 'free',
        published INTEGER NOT NULL DEFAULT 0,
        position INTEGER NOT NULL DEFAULT 0,
        origin TEXT NOT NULL DEFAULT 'manual',
        created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_topics_category ON topics(category_id, position)",
    r#"
    CREATE TABLE IF NOT EXISTS topic_progress (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        topic_id TEXT NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
        completed_at TEXT NOT NULL,
        PRIMARY KEY (user_id, topic_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS resources (
        id TEXT PRIMARY KEY,
        topic_id TEXT REFERENCES topics(id) ON DELETE CASCADE,
        kind TEXT NOT NULL,
        title_ru TEXT NOT NULL DEFAULT '',
        title_ro TEXT NOT NULL DEFAULT '',
        url TEXT NOT NULL,
        attribution TEXT,
        access_level TEXT NOT NULL DEFAULT 'free',
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_resources_topic ON resources(topic_id)",
    r#"
    CREATE TABLE IF NOT EXISTS quizzes (
        id TEXT PRIMARY KEY,
        topic_id TEXT REFERENCES topics(id) ON DELETE SET NULL,
        title_ru TEXT NOT NULL DEFAULT '',
        title_ro TEXT NOT NULL DEFAULT '',
        description_ru TEXT NOT NULL DEFAULT '',
        description_ro TEXT NOT NULL DEFAULT '',
        access_level TEXT NOT NULL DEFAULT 'free',
        pass_percent INTEGER NOT NULL DEFAULT 70,
        shuffle_questions INTEGER NOT NULL DEFAULT 1,
        shuffle_options INTEGER NOT NULL DEFAULT 1,
        published INTEGER NOT NULL DEFAULT 0,
        origin TEXT NOT NULL DEFAULT 'manual',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS quiz_questions (
        id TEXT PRIMARY KEY,
        quiz_id TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        prompt_ru TEXT NOT NULL DEFAULT '',
        prompt_ro TEXT NOT NULL DEFAULT '',
        options TEXT NOT NULL,
        correct_index INTEGER NOT NULL,
        explanation_ru TEXT NOT NULL DEFAULT '',
        explanation_ro TEXT NOT NULL DEFAULT ''
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_questions_quiz ON quiz_questions(quiz_id, position)",
    r#"
    CREATE TABLE IF NOT EXISTS quiz_attempts (
        id TEXT PRIMARY KEY,
        quiz_id TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        correct INTEGER NOT NULL,
        total INTEGER NOT NULL,
        percent INTEGER NOT NULL,
        passed INTEGER NOT NULL,
        answers TEXT NOT NULL,
        duration_secs INTEGER,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attempts_user ON quiz_attempts(user_id, quiz_id)",
    r#"
    CREATE TABLE IF NOT EXISTS plans (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        tier TEXT NOT NULL,
        name_ru TEXT NOT NULL DEFAULT '',
        name_ro TEXT NOT NULL DEFAULT '',
        price_cents INTEGER NOT NULL,
        currency TEXT NOT NULL,
        duration_days INTEGER NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS subscriptions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        plan_id TEXT NOT NULL REFERENCES plans(id),
        tier TEXT NOT NULL,
        status TEXT NOT NULL,
        started_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        cancelled_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS payments (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        plan_id TEXT NOT NULL REFERENCES plans(id),
        provider TEXT NOT NULL,
        order_reference TEXT NOT NULL UNIQUE,
        provider_reference TEXT,
        amount_cents INTEGER NOT NULL,
        currency TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        subscription_id TEXT REFERENCES subscriptions(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        settled_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        direct_key TEXT UNIQUE,
        owner_id TEXT REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        last_message_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversation_members (
        conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        joined_at TEXT NOT NULL,
        last_read_at TEXT,
        PRIMARY KEY (conversation_id, user_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_members_user ON conversation_members(user_id)",
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        sender_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        kind TEXT NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL DEFAULT '',
        link TEXT,
        read_at TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS schedule_events (
        id TEXT PRIMARY KEY,
        title_ru TEXT NOT NULL DEFAULT '',
        title_ro TEXT NOT NULL DEFAULT '',
        description_ru TEXT NOT NULL DEFAULT '',
        description_ro TEXT NOT NULL DEFAULT '',
        starts_at TEXT NOT NULL,
        ends_at TEXT NOT NULL,
        location TEXT,
        online_url TEXT,
        access_level TEXT NOT NULL DEFAULT 'free',
        capacity INTEGER,
        reminder_sent INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_schedule_starts ON schedule_events(starts_at)",
    r#"
    CREATE TABLE IF NOT EXISTS schedule_registrations (
        event_id TEXT NOT NULL REFERENCES schedule_events(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        PRIMARY KEY (event_id, user_id)
    )
    "#,
];

/// Built-in subscription plans (code, tier, name ru, name ro, price cents, days)
const DEFAULT_PLANS: &[(&str, &str, &str, &str, i64, i64)] = &[
    ("basic-monthly", "basic", "Базовый, месяц", "Bază, lunar", 9_900, 30),
    ("premium-monthly", "premium", "Премиум, месяц", "Premium, lunar", 19_900, 30),
    ("premium-yearly", "premium", "Премиум, год", "Premium, anual", 179_900, 365),
];

/// Currency for built-in plans
const DEFAULT_CURRENCY: &str = "MDL";

/// Insert built-in plans that do not exist yet (matched by code)
async fn seed_default_plans(pool: &SqlitePool) -> Result<()> {
    let now = crate::time::now();
    for (code, tier, name_ru, name_ro, price_cents, days) in DEFAULT_PLANS {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO plans
                (id, code, tier, name_ru, name_ro, price_cents, currency, duration_days, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(code)
        .bind(tier)
        .bind(name_ru)
        .bind(name_ro)
        .bind(price_cents)
        .bind(DEFAULT_CURRENCY)
        .bind(days)
        .bind(now)
        .execute(pool)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_has_schema() {
        let pool = connect_in_memory().await.unwrap();

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(&pool)
                .await
                .unwrap();

        for expected in ["users", "topics", "quiz_questions", "payments", "messages", "schedule_events"] {
            assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
        }
    }

    #[tokio::test]
    async fn test_default_plans_seeded_once() {
        let pool = connect_in_memory().await.unwrap();
        seed_default_plans(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, DEFAULT_PLANS.len() as i64);
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = connect_in_memory().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES ('t', 'missing', 'x', 'y')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
