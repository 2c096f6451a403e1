//! Tests for database initialization
//!
//! - Automatic database creation on first run
//! - Idempotent schema creation on an existing database
//! - Per-connection pragmas (foreign keys) and schema constraints

use lsa_common::db::init::{init_database, SCHEMA_VERSION};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("lsa.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("lsa.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version WHERE version = ?")
        .bind(SCHEMA_VERSION)
        .fetch_one(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(versions, 1);
}

#[tokio::test]
async fn test_all_tables_created() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("lsa.db")).await.unwrap();

    for table in [
        "users",
        "training_modules",
        "module_progress",
        "live_sessions",
        "session_products",
        "live_reports",
        "report_traffic_sources",
        "product_lines",
        "product_merge_groups",
        "activity_log",
    ] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1, "Missing table {}", table);
    }
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("lsa.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO product_lines (id, report_id, position, name) VALUES ('p1', 'missing', 0, 'x')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "Orphan product line should be rejected");
}

#[tokio::test]
async fn test_one_in_progress_session_per_owner() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("lsa.db")).await.unwrap();

    let insert = "INSERT INTO live_sessions (id, owner_id, status, created_at, updated_at)
                  VALUES (?, 'owner', 'IN_PROGRESS', '2024-01-01T00:00:00.000Z', '2024-01-01T00:00:00.000Z')";
    sqlx::query(insert).bind("s1").execute(&pool).await.unwrap();
    let second = sqlx::query(insert).bind("s2").execute(&pool).await;

    assert!(second.is_err(), "Second IN_PROGRESS session for the same owner should be rejected");
}

#[tokio::test]
async fn test_status_check_constraint() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("lsa.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO live_sessions (id, owner_id, status, created_at, updated_at)
         VALUES ('s1', 'owner', 'PAUSED', 'x', 'x')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}
