//! Integration tests for on-disk database initialization

use mta_common::db::{init_database, migrations, settings};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("mta.db");
    assert!(!db_path.exists());

    let pool = init_database(&db_path).await.expect("database should initialize");

    assert!(db_path.exists(), "Database file was not created");
    let version = migrations::get_schema_version(&pool).await.unwrap();
    assert_eq!(version, migrations::CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_database_opens_existing_and_keeps_settings() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("mta.db");

    let pool = init_database(&db_path).await.unwrap();
    settings::set_setting(&pool, settings::QUIZ_PASS_PERCENT, 85).await.unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.expect("reopen should succeed");
    let pass: Option<u8> = settings::get_setting(&pool, settings::QUIZ_PASS_PERCENT)
        .await
        .unwrap();
    assert_eq!(pass, Some(85));

    let plans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(plans, 3);
}
