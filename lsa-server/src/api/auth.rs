//! Caller identity middleware
//!
//! Authentication happens upstream; requests arrive with the authenticated
//! user's id in the `X-User-Id` header. Every protected handler reads the
//! resulting [`Caller`] and scopes all data access to it.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use lsa_common::uuid_utils;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::error::ApiError;
use crate::models::ActivityDetails;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the user making the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
}

/// Resolve the caller from `X-User-Id`, or reject with 401
///
/// Unknown ids are provisioned as STREAMER on first sight.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let value = request
        .headers()
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("X-User-Id header is not valid text".to_string()))?;
    let user_id = uuid_utils::parse(value.trim())
        .map_err(|_| ApiError::Unauthorized(format!("X-User-Id is not a UUID: {}", value)))?;

    let now = state.clock.now();
    if db::users::ensure_user(&state.db, user_id, now).await? {
        db::activity::record(&state.db, user_id, &ActivityDetails::Login { user_id }, now).await?;
        info!(user_id = %user_id, "New user provisioned");
    }

    request.extensions_mut().insert(Caller { user_id });
    Ok(next.run(request).await)
}
