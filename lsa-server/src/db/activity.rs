//! Activity log persistence

use chrono::{DateTime, Utc};
use lsa_common::{time, Error, Result};
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::models::{ActivityDetails, ActivityEntry};

pub async fn record<'e, E>(
    executor: E,
    user_id: Uuid,
    details: &ActivityDetails,
    now: DateTime<Utc>,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let payload = serde_json::to_string(details)
        .map_err(|e| Error::Internal(format!("Failed to serialize activity details: {}", e)))?;

    sqlx::query("INSERT INTO activity_log (user_id, action, details, created_at) VALUES (?, ?, ?, ?)")
        .bind(user_id.to_string())
        .bind(details.action())
        .bind(payload)
        .bind(time::format_timestamp(now))
        .execute(executor)
        .await?;

    Ok(())
}

/// Most recent entries first
pub async fn list_recent(pool: &SqlitePool, user_id: Uuid, limit: i64) -> Result<Vec<ActivityEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, action, details, created_at
        FROM activity_log
        WHERE user_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let action: String = row.try_get("action")?;
            let payload: String = row.try_get("details")?;
            Ok(ActivityEntry {
                id: row.try_get("id")?,
                user_id: super::get_uuid(row, "user_id")?,
                details: ActivityDetails::decode(&action, &payload),
                action,
                created_at: super::get_timestamp(row, "created_at")?,
            })
        })
        .collect()
}
