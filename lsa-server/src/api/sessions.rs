//! Live session endpoints
//!
//! POST /sessions/start, /sessions/schedule, /sessions/:id/finish
//! GET /sessions, /sessions/active, /sessions/scheduled, /sessions/:id
//! PATCH /sessions/:id, PUT/DELETE /sessions/scheduled/:id

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    routing::{get, post, put},
    Extension, Json, Router,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::auth::Caller;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AiMetrics, FinishInput, LivePatch, LiveSession, ScheduleInput, ScheduledPatch, SessionWithProducts,
    StartInput,
};
use crate::services::Screenshot;
use crate::AppState;

/// POST /sessions/start
///
/// 201 with the live session, 403 TRAINING_INCOMPLETE when the gate denies.
pub async fn start_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<StartInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<LiveSession>)> {
    let Json(input) = body?;
    let session = state.sessions.start(caller.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /sessions/schedule
pub async fn schedule_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<ScheduleInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SessionWithProducts>)> {
    let Json(input) = body?;
    let session = state.sessions.schedule(caller.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<LiveSession>>> {
    Ok(Json(state.sessions.list(caller.user_id).await?))
}

/// GET /sessions/active
pub async fn active_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<LiveSession>> {
    Ok(Json(state.sessions.active(caller.user_id).await?))
}

/// GET /sessions/scheduled
pub async fn list_scheduled(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<SessionWithProducts>>> {
    Ok(Json(state.sessions.list_scheduled(caller.user_id).await?))
}

/// GET /sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionWithProducts>> {
    Ok(Json(state.sessions.get(session_id, caller.user_id).await?))
}

/// PATCH /sessions/:id
pub async fn update_live(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<Uuid>,
    body: Result<Json<LivePatch>, JsonRejection>,
) -> ApiResult<Json<LiveSession>> {
    let Json(patch) = body?;
    Ok(Json(state.sessions.update_live(session_id, caller.user_id, patch).await?))
}

/// PUT /sessions/scheduled/:id
pub async fn update_scheduled(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<Uuid>,
    body: Result<Json<ScheduledPatch>, JsonRejection>,
) -> ApiResult<Json<SessionWithProducts>> {
    let Json(patch) = body?;
    Ok(Json(
        state
            .sessions
            .update_scheduled(session_id, caller.user_id, patch)
            .await?,
    ))
}

/// DELETE /sessions/scheduled/:id
pub async fn delete_scheduled(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.sessions.delete_scheduled(session_id, caller.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_field<T: std::str::FromStr>(name: &str, text: &str) -> ApiResult<Option<T>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<T>()
        .map(Some)
        .map_err(|_| ApiError::Validation(format!("Field {} is not a valid number: {}", name, text)))
}

fn required<T>(name: &str, value: Option<T>) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::Validation(format!("Missing required field: {}", name)))
}

/// Numeric fields plus any uploaded screenshot files
async fn read_finish_form(mut form: Multipart) -> ApiResult<(FinishInput, Vec<Screenshot>)> {
    let mut followers_end = None;
    let mut coins_end = None;
    let mut ai = AiMetrics::default();
    let mut screenshots = Vec::new();

    while let Some(field) = form
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if field.file_name().is_some() {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read upload {}: {}", name, e)))?;
            if !bytes.is_empty() {
                screenshots.push(Screenshot {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read field {}: {}", name, e)))?;
        match name.as_str() {
            "followersEnd" => followers_end = parse_field(&name, &text)?,
            "coinsEnd" => coins_end = parse_field(&name, &text)?,
            "likes" => ai.likes = parse_field(&name, &text)?,
            "shares" => ai.shares = parse_field(&name, &text)?,
            "comments" => ai.comments = parse_field(&name, &text)?,
            "views" => ai.views = parse_field(&name, &text)?,
            "engagementRate" => ai.engagement_rate = parse_field(&name, &text)?,
            _ => {}
        }
    }

    let input = FinishInput {
        followers_end: required("followersEnd", followers_end)?,
        coins_end: required("coinsEnd", coins_end)?,
        ai_metrics: ai,
    };
    Ok((input, screenshots))
}

/// Metrics read from screenshots; failures never block finishing
async fn extract_metrics(state: &AppState, session_id: Uuid, screenshots: &[Screenshot]) -> AiMetrics {
    if screenshots.is_empty() {
        return AiMetrics::default();
    }
    let Some(extractor) = &state.extractor else {
        warn!(
            session_id = %session_id,
            screenshots = screenshots.len(),
            "Screenshots uploaded but no extractor configured; ignoring"
        );
        return AiMetrics::default();
    };

    match extractor.extract(screenshots).await {
        Ok(metrics) => {
            info!(session_id = %session_id, screenshots = screenshots.len(), "Screenshot metrics extracted");
            metrics
        }
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Screenshot extraction failed; finishing without it");
            AiMetrics::default()
        }
    }
}

/// POST /sessions/:id/finish
///
/// Accepts multipart (numeric fields and optional screenshot files) or JSON.
pub async fn finish_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(session_id): Path<Uuid>,
    request: Request,
) -> ApiResult<Json<LiveSession>> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let (input, screenshots) = if is_multipart {
        let form = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        read_finish_form(form).await?
    } else {
        let Json(input) = Json::<FinishInput>::from_request(request, &state).await?;
        (input, Vec::new())
    };
    input.validate()?;

    // Ownership and status are settled before any screenshot leaves the service
    state.sessions.finishable(session_id, caller.user_id).await?;
    let extracted = extract_metrics(&state, session_id, &screenshots).await;
    Ok(Json(
        state
            .sessions
            .finish(session_id, caller.user_id, input, extracted)
            .await?,
    ))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/start", post(start_session))
        .route("/sessions/schedule", post(schedule_session))
        .route("/sessions/active", get(active_session))
        .route("/sessions/scheduled", get(list_scheduled))
        .route(
            "/sessions/scheduled/:id",
            put(update_scheduled).delete(delete_scheduled),
        )
        .route("/sessions/:id", get(get_session).patch(update_live))
        .route("/sessions/:id/finish", post(finish_session))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_field_is_absent() {
        assert_eq!(parse_field::<i64>("likes", "  ").unwrap(), None);
        assert_eq!(parse_field::<i64>("likes", "42").unwrap(), Some(42));
        assert_eq!(parse_field::<f64>("coinsEnd", "10.5").unwrap(), Some(10.5));
    }

    #[test]
    fn test_bad_number_rejected() {
        let err = parse_field::<i64>("likes", "many").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_missing_required_field() {
        assert!(matches!(required::<i64>("followersEnd", None), Err(ApiError::Validation(_))));
    }
}
