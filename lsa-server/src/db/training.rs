//! Training modules and per-user progress

use chrono::{DateTime, Utc};
use lsa_common::{time, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ModuleStatus, ModuleWithProgress, TrainingModule};

pub async fn insert_module(
    pool: &SqlitePool,
    module: &TrainingModule,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO training_modules (id, title, position, status, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(module.id.to_string())
    .bind(&module.title)
    .bind(module.position)
    .bind(module.status.as_str())
    .bind(time::format_timestamp(now))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_module(pool: &SqlitePool, module_id: Uuid) -> Result<Option<TrainingModule>> {
    let row = sqlx::query("SELECT id, title, position, status FROM training_modules WHERE id = ?")
        .bind(module_id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let status: String = row.try_get("status")?;
            Ok(Some(TrainingModule {
                id: super::get_uuid(&row, "id")?,
                title: row.try_get("title")?,
                position: row.try_get("position")?,
                status: ModuleStatus::parse(&status)?,
            }))
        }
        None => Ok(None),
    }
}

/// Active modules with the user's completion flags, in display order
pub async fn list_active_with_progress(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<Vec<ModuleWithProgress>> {
    let rows = sqlx::query(
        r#"
        SELECT m.id, m.title, m.position, m.status,
               COALESCE(p.completed, 0) AS completed, p.completed_at
        FROM training_modules m
        LEFT JOIN module_progress p ON p.module_id = m.id AND p.user_id = ?
        WHERE m.status = 'ACTIVE'
        ORDER BY m.position, m.id
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let status: String = row.try_get("status")?;
            Ok(ModuleWithProgress {
                module: TrainingModule {
                    id: super::get_uuid(row, "id")?,
                    title: row.try_get("title")?,
                    position: row.try_get("position")?,
                    status: ModuleStatus::parse(&status)?,
                },
                completed: row.try_get::<i64, _>("completed")? != 0,
                completed_at: super::get_optional_timestamp(row, "completed_at")?,
            })
        })
        .collect()
}

/// `(completed, total)` over ACTIVE modules only
pub async fn completion_counts(pool: &SqlitePool, user_id: Uuid) -> Result<(i64, i64)> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN p.completed = 1 THEN 1 ELSE 0 END), 0) AS completed
        FROM training_modules m
        LEFT JOIN module_progress p ON p.module_id = m.id AND p.user_id = ?
        WHERE m.status = 'ACTIVE'
        "#,
    )
    .bind(user_id.to_string())
    .fetch_one(pool)
    .await?;

    Ok((row.try_get("completed")?, row.try_get("total")?))
}

/// Mark a module completed; completing twice keeps the first timestamp
pub async fn complete_module(
    pool: &SqlitePool,
    user_id: Uuid,
    module_id: Uuid,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO module_progress (user_id, module_id, completed, completed_at)
        VALUES (?, ?, 1, ?)
        ON CONFLICT(user_id, module_id) DO UPDATE SET
            completed = 1,
            completed_at = COALESCE(module_progress.completed_at, excluded.completed_at)
        "#,
    )
    .bind(user_id.to_string())
    .bind(module_id.to_string())
    .bind(time::format_timestamp(now))
    .execute(pool)
    .await?;

    Ok(())
}
