//! Database access for lsa-server
//!
//! One module per table family. Functions that take part in a larger
//! atomic operation accept any sqlx executor so callers can run them on a
//! pool or inside a transaction.

pub mod activity;
pub mod products;
pub mod reports;
pub mod sessions;
pub mod training;
pub mod users;

use chrono::{DateTime, Utc};
use lsa_common::{time, uuid_utils, Error, Result};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

pub(crate) fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    uuid_utils::parse(&value)
        .map_err(|e| Error::Internal(format!("Invalid UUID in {}: '{}': {}", column, value, e)))
}

pub(crate) fn get_optional_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let value: Option<String> = row.try_get(column)?;
    value
        .map(|v| {
            uuid_utils::parse(&v)
                .map_err(|e| Error::Internal(format!("Invalid UUID in {}: '{}': {}", column, v, e)))
        })
        .transpose()
}

pub(crate) fn get_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let value: String = row.try_get(column)?;
    time::parse_timestamp(&value)
}

pub(crate) fn get_optional_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    time::parse_optional_timestamp(row.try_get(column)?)
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
pub(crate) fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
