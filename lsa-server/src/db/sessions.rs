//! Live session persistence
//!
//! Every status change is a conditional UPDATE keyed on id, owner and the
//! expected prior status. Callers read the affected row count: zero means
//! another request changed the session first.

use chrono::{DateTime, Utc};
use lsa_common::{time, Result};
use sqlx::{sqlite::SqliteRow, Executor, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::{get_optional_timestamp, get_timestamp, get_uuid};
use crate::models::{
    AiMetrics, FinishOutcome, LivePatch, LiveSession, NewSessionProduct, ScheduledPatch,
    SessionProduct, SessionStatus,
};

const SESSION_COLUMNS: &str = r#"
    id, owner_id, title, description, status, scheduled_at, started_at, finished_at,
    followers_start, followers_end, coins_start, coins_end,
    duration_minutes, followers_gained, coins_spent,
    live_link, peak_viewers, chat_interactions, notes,
    likes, shares, comments, views, engagement_rate,
    created_at, updated_at
"#;

fn session_from_row(row: &SqliteRow) -> Result<LiveSession> {
    let status: String = row.try_get("status")?;
    Ok(LiveSession {
        id: get_uuid(row, "id")?,
        owner_id: get_uuid(row, "owner_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: SessionStatus::parse(&status)?,
        scheduled_at: get_optional_timestamp(row, "scheduled_at")?,
        started_at: get_optional_timestamp(row, "started_at")?,
        finished_at: get_optional_timestamp(row, "finished_at")?,
        followers_start: row.try_get("followers_start")?,
        followers_end: row.try_get("followers_end")?,
        coins_start: row.try_get("coins_start")?,
        coins_end: row.try_get("coins_end")?,
        duration_minutes: row.try_get("duration_minutes")?,
        followers_gained: row.try_get("followers_gained")?,
        coins_spent: row.try_get("coins_spent")?,
        live_link: row.try_get("live_link")?,
        peak_viewers: row.try_get("peak_viewers")?,
        chat_interactions: row.try_get("chat_interactions")?,
        notes: row.try_get("notes")?,
        likes: row.try_get("likes")?,
        shares: row.try_get("shares")?,
        comments: row.try_get("comments")?,
        views: row.try_get("views")?,
        engagement_rate: row.try_get("engagement_rate")?,
        created_at: get_timestamp(row, "created_at")?,
        updated_at: get_timestamp(row, "updated_at")?,
    })
}

/// Load a session only if it belongs to `owner_id`
pub async fn get_owned<'e, E>(executor: E, session_id: Uuid, owner_id: Uuid) -> Result<Option<LiveSession>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM live_sessions WHERE id = ? AND owner_id = ?",
        SESSION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(session_id.to_string())
        .bind(owner_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Sessions of one owner, optionally restricted to a status
///
/// Scheduled sessions order by their planned time, the rest newest first.
pub async fn list_by_owner<'e, E>(
    executor: E,
    owner_id: Uuid,
    status: Option<SessionStatus>,
) -> Result<Vec<LiveSession>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = match status {
        Some(SessionStatus::Scheduled) => format!(
            "SELECT {} FROM live_sessions WHERE owner_id = ? AND status = ? ORDER BY scheduled_at, id",
            SESSION_COLUMNS
        ),
        Some(_) => format!(
            "SELECT {} FROM live_sessions WHERE owner_id = ? AND status = ? ORDER BY created_at DESC, id",
            SESSION_COLUMNS
        ),
        None => format!(
            "SELECT {} FROM live_sessions WHERE owner_id = ? ORDER BY created_at DESC, id",
            SESSION_COLUMNS
        ),
    };

    let mut query = sqlx::query(&sql).bind(owner_id.to_string());
    if let Some(status) = status {
        query = query.bind(status.as_str());
    }
    let rows = query.fetch_all(executor).await?;

    rows.iter().map(session_from_row).collect()
}

pub async fn find_in_progress<'e, E>(executor: E, owner_id: Uuid) -> Result<Option<LiveSession>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM live_sessions WHERE owner_id = ? AND status = 'IN_PROGRESS'",
        SESSION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(owner_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(session_from_row).transpose()
}

/// Insert a new session row as given
pub async fn insert_session<'e, E>(executor: E, session: &LiveSession) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO live_sessions (
            id, owner_id, title, description, status, scheduled_at, started_at,
            followers_start, coins_start, live_link, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(session.owner_id.to_string())
    .bind(&session.title)
    .bind(&session.description)
    .bind(session.status.as_str())
    .bind(session.scheduled_at.map(time::format_timestamp))
    .bind(session.started_at.map(time::format_timestamp))
    .bind(session.followers_start)
    .bind(session.coins_start)
    .bind(&session.live_link)
    .bind(time::format_timestamp(session.created_at))
    .bind(time::format_timestamp(session.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// SCHEDULED → IN_PROGRESS
#[allow(clippy::too_many_arguments)]
pub async fn promote_to_in_progress<'e, E>(
    executor: E,
    session_id: Uuid,
    owner_id: Uuid,
    followers_start: i64,
    coins_start: f64,
    live_link: Option<&str>,
    now: DateTime<Utc>,
) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = time::format_timestamp(now);
    let result = sqlx::query(
        r#"
        UPDATE live_sessions SET
            status = 'IN_PROGRESS',
            started_at = ?,
            followers_start = ?,
            coins_start = ?,
            live_link = COALESCE(?, live_link),
            updated_at = ?
        WHERE id = ? AND owner_id = ? AND status = 'SCHEDULED'
        "#,
    )
    .bind(&now)
    .bind(followers_start)
    .bind(coins_start)
    .bind(live_link)
    .bind(&now)
    .bind(session_id.to_string())
    .bind(owner_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Apply a partial update while IN_PROGRESS; absent fields keep their values
pub async fn update_live<'e, E>(
    executor: E,
    session_id: Uuid,
    owner_id: Uuid,
    patch: &LivePatch,
    now: DateTime<Utc>,
) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE live_sessions SET
            peak_viewers = COALESCE(?, peak_viewers),
            chat_interactions = COALESCE(?, chat_interactions),
            notes = COALESCE(?, notes),
            updated_at = ?
        WHERE id = ? AND owner_id = ? AND status = 'IN_PROGRESS'
        "#,
    )
    .bind(patch.peak_viewers)
    .bind(patch.chat_interactions)
    .bind(&patch.notes)
    .bind(time::format_timestamp(now))
    .bind(session_id.to_string())
    .bind(owner_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// IN_PROGRESS → FINISHED
///
/// AI metrics only overwrite columns for fields that are present.
#[allow(clippy::too_many_arguments)]
pub async fn finish<'e, E>(
    executor: E,
    session_id: Uuid,
    owner_id: Uuid,
    followers_end: i64,
    coins_end: f64,
    outcome: &FinishOutcome,
    ai_metrics: &AiMetrics,
    now: DateTime<Utc>,
) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = time::format_timestamp(now);
    let result = sqlx::query(
        r#"
        UPDATE live_sessions SET
            status = 'FINISHED',
            finished_at = ?,
            followers_end = ?,
            coins_end = ?,
            duration_minutes = ?,
            followers_gained = ?,
            coins_spent = ?,
            likes = COALESCE(?, likes),
            shares = COALESCE(?, shares),
            comments = COALESCE(?, comments),
            views = COALESCE(?, views),
            engagement_rate = COALESCE(?, engagement_rate),
            updated_at = ?
        WHERE id = ? AND owner_id = ? AND status = 'IN_PROGRESS'
        "#,
    )
    .bind(&now)
    .bind(followers_end)
    .bind(coins_end)
    .bind(outcome.duration_minutes)
    .bind(outcome.followers_gained)
    .bind(outcome.coins_spent)
    .bind(ai_metrics.likes)
    .bind(ai_metrics.shares)
    .bind(ai_metrics.comments)
    .bind(ai_metrics.views)
    .bind(ai_metrics.engagement_rate)
    .bind(&now)
    .bind(session_id.to_string())
    .bind(owner_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Partial update of a SCHEDULED session's own fields
pub async fn update_scheduled<'e, E>(
    executor: E,
    session_id: Uuid,
    owner_id: Uuid,
    patch: &ScheduledPatch,
    now: DateTime<Utc>,
) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE live_sessions SET
            title = COALESCE(?, title),
            scheduled_at = COALESCE(?, scheduled_at),
            description = COALESCE(?, description),
            updated_at = ?
        WHERE id = ? AND owner_id = ? AND status = 'SCHEDULED'
        "#,
    )
    .bind(&patch.title)
    .bind(patch.scheduled_at.map(time::format_timestamp))
    .bind(&patch.description)
    .bind(time::format_timestamp(now))
    .bind(session_id.to_string())
    .bind(owner_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_scheduled<'e, E>(executor: E, session_id: Uuid, owner_id: Uuid) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "DELETE FROM live_sessions WHERE id = ? AND owner_id = ? AND status = 'SCHEDULED'",
    )
    .bind(session_id.to_string())
    .bind(owner_id.to_string())
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Insert products in list order, numbering positions from 0
pub async fn insert_products(
    conn: &mut SqliteConnection,
    session_id: Uuid,
    products: &[NewSessionProduct],
) -> Result<()> {
    for (position, product) in products.iter().enumerate() {
        sqlx::query(
            "INSERT INTO session_products (id, session_id, name, price, position) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(session_id.to_string())
        .bind(product.name.trim())
        .bind(product.price)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn delete_products<'e, E>(executor: E, session_id: Uuid) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM session_products WHERE session_id = ?")
        .bind(session_id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn list_products<'e, E>(executor: E, session_id: Uuid) -> Result<Vec<SessionProduct>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT id, session_id, name, price, position FROM session_products WHERE session_id = ? ORDER BY position",
    )
    .bind(session_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(SessionProduct {
                id: get_uuid(row, "id")?,
                session_id: get_uuid(row, "session_id")?,
                name: row.try_get("name")?,
                price: row.try_get("price")?,
                position: row.try_get("position")?,
            })
        })
        .collect()
}
