//! Database initialization
//!
//! Creates the database file on first run, applies connection pragmas and
//! creates every table idempotently. Safe to call on an existing database.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Schema version written by this build
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas are set per connection so every pooled connection enforces
    // foreign keys and waits on locks instead of failing immediately.
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_training_tables(pool).await?;
    create_live_sessions_table(pool).await?;
    create_session_products_table(pool).await?;
    create_live_reports_table(pool).await?;
    create_report_traffic_sources_table(pool).await?;
    create_product_lines_table(pool).await?;
    create_product_merge_groups_table(pool).await?;
    create_activity_log_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Users known to the service
///
/// Identities are issued elsewhere; rows carry only what the access gate
/// needs (role, skip-tutorial flag).
async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            display_name TEXT,
            role TEXT NOT NULL DEFAULT 'STREAMER'
                CHECK (role IN ('ADMIN', 'MANAGER', 'STREAMER')),
            skip_tutorial INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_training_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS training_modules (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'ACTIVE'
                CHECK (status IN ('ACTIVE', 'DRAFT', 'ARCHIVED')),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS module_progress (
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            module_id TEXT NOT NULL REFERENCES training_modules(id) ON DELETE CASCADE,
            completed INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT,
            PRIMARY KEY (user_id, module_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_live_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS live_sessions (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            title TEXT,
            description TEXT,
            status TEXT NOT NULL
                CHECK (status IN ('SCHEDULED', 'IN_PROGRESS', 'FINISHED', 'CANCELLED')),
            scheduled_at TEXT,
            started_at TEXT,
            finished_at TEXT,
            followers_start INTEGER,
            followers_end INTEGER,
            coins_start REAL,
            coins_end REAL,
            duration_minutes INTEGER,
            followers_gained INTEGER,
            coins_spent REAL,
            live_link TEXT,
            peak_viewers INTEGER,
            chat_interactions INTEGER,
            notes TEXT,
            likes INTEGER,
            shares INTEGER,
            comments INTEGER,
            views INTEGER,
            engagement_rate REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_live_sessions_owner ON live_sessions(owner_id, status)")
        .execute(pool)
        .await?;

    // One live broadcast at a time per owner
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_live_sessions_one_in_progress
        ON live_sessions(owner_id) WHERE status = 'IN_PROGRESS'
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_session_products_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_products (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES live_sessions(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            price REAL,
            position INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_session_products_session ON session_products(session_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_live_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS live_reports (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            session_id TEXT UNIQUE REFERENCES live_sessions(id),
            store TEXT NOT NULL DEFAULT '',
            report_date TEXT NOT NULL,
            live_title TEXT NOT NULL DEFAULT '',
            -- Unicode-lowercased live_title for case-insensitive search
            live_title_folded TEXT NOT NULL DEFAULT '',
            live_duration_seconds INTEGER NOT NULL DEFAULT 0,
            revenue REAL NOT NULL DEFAULT 0,
            orders INTEGER NOT NULL DEFAULT 0,
            items_sold INTEGER NOT NULL DEFAULT 0,
            buyers INTEGER NOT NULL DEFAULT 0,
            viewers INTEGER NOT NULL DEFAULT 0,
            engaged_viewers INTEGER NOT NULL DEFAULT 0,
            views INTEGER NOT NULL DEFAULT 0,
            peak_viewers INTEGER NOT NULL DEFAULT 0,
            avg_watch_time_seconds INTEGER NOT NULL DEFAULT 0,
            likes INTEGER NOT NULL DEFAULT 0,
            shares INTEGER NOT NULL DEFAULT 0,
            comments INTEGER NOT NULL DEFAULT 0,
            new_followers INTEGER NOT NULL DEFAULT 0,
            coupons_used INTEGER NOT NULL DEFAULT 0,
            coins_used INTEGER NOT NULL DEFAULT 0,
            coins_cost REAL NOT NULL DEFAULT 0,
            product_impressions INTEGER NOT NULL DEFAULT 0,
            product_clicks INTEGER NOT NULL DEFAULT 0,
            add_to_cart INTEGER NOT NULL DEFAULT 0,
            conversion_rate REAL,
            entry_source TEXT NOT NULL DEFAULT 'MANUAL'
                CHECK (entry_source IN ('MANUAL', 'AI')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_live_reports_owner_date ON live_reports(owner_id, report_date)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_report_traffic_sources_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS report_traffic_sources (
            report_id TEXT NOT NULL REFERENCES live_reports(id) ON DELETE CASCADE,
            source TEXT NOT NULL,
            views INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (report_id, source)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_product_lines_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_lines (
            id TEXT PRIMARY KEY,
            report_id TEXT NOT NULL REFERENCES live_reports(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            canonical_group_id TEXT,
            price REAL,
            product_clicks INTEGER NOT NULL DEFAULT 0,
            add_to_cart INTEGER NOT NULL DEFAULT 0,
            orders INTEGER NOT NULL DEFAULT 0,
            items_sold INTEGER NOT NULL DEFAULT 0,
            revenue REAL NOT NULL DEFAULT 0,
            external_item_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_product_lines_report ON product_lines(report_id, position)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_product_lines_group ON product_lines(canonical_group_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Canonical product groups produced by deduplication
///
/// Holds only the grouping record; aggregate counters are always computed
/// by summing member product lines.
async fn create_product_merge_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_merge_groups (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            canonical_name TEXT NOT NULL,
            merged_names TEXT NOT NULL,
            member_count INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_product_merge_groups_scope ON product_merge_groups(owner_id, scope_key)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_activity_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS activity_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            action TEXT NOT NULL,
            details TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_activity_log_user ON activity_log(user_id, id)")
        .execute(pool)
        .await?;

    Ok(())
}
