//! User records consulted by the training gate

use chrono::{DateTime, Utc};
use lsa_common::{time, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::UserRole;

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub skip_tutorial: bool,
}

/// Create the user as STREAMER if it has never been seen
///
/// Returns whether a new row was created.
pub async fn ensure_user(pool: &SqlitePool, user_id: Uuid, now: DateTime<Utc>) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO users (id, role, skip_tutorial, created_at) VALUES (?, 'STREAMER', 0, ?)",
    )
    .bind(user_id.to_string())
    .bind(time::format_timestamp(now))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_user(pool: &SqlitePool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let row = sqlx::query("SELECT id, display_name, role, skip_tutorial FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let role: String = row.try_get("role")?;
            Ok(Some(UserRecord {
                id: super::get_uuid(&row, "id")?,
                display_name: row.try_get("display_name")?,
                role: UserRole::parse(&role)?,
                skip_tutorial: row.try_get::<i64, _>("skip_tutorial")? != 0,
            }))
        }
        None => Ok(None),
    }
}

pub async fn set_skip_tutorial(pool: &SqlitePool, user_id: Uuid, skip: bool) -> Result<()> {
    sqlx::query("UPDATE users SET skip_tutorial = ? WHERE id = ?")
        .bind(skip as i64)
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Change a user's role
///
/// Roles are managed by the identity provider; this is the local mirror.
pub async fn set_role(pool: &SqlitePool, user_id: Uuid, role: UserRole) -> Result<()> {
    sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}
