//! Activity log endpoint

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;

use super::auth::Caller;
use crate::db;
use crate::error::ApiResult;
use crate::models::ActivityEntry;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

/// GET /activity?limit=
pub async fn list_activity(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ActivityQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ActivityEntry>>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(db::activity::list_recent(&state.db, caller.user_id, limit).await?))
}

pub fn activity_routes() -> Router<AppState> {
    Router::new().route("/activity", get(list_activity))
}
