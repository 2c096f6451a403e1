//! Training module endpoints
//!
//! GET /modules, POST /modules/:id/complete, POST /modules/skip, GET /modules/gate

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::auth::Caller;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{GateDecision, ModuleStatus, ModuleWithProgress};
use crate::AppState;

/// Body of POST /modules/skip
#[derive(Debug, Deserialize)]
pub struct SkipRequest {
    #[serde(default = "default_skip")]
    pub skip: bool,
}

fn default_skip() -> bool {
    true
}

/// GET /modules
pub async fn list_modules(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<Vec<ModuleWithProgress>>> {
    let modules = db::training::list_active_with_progress(&state.db, caller.user_id).await?;
    Ok(Json(modules))
}

/// POST /modules/:id/complete
///
/// Only ACTIVE modules can be completed; returns the refreshed module list.
pub async fn complete_module(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(module_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ModuleWithProgress>>> {
    match db::training::get_module(&state.db, module_id).await? {
        Some(module) if module.status == ModuleStatus::Active => {}
        _ => return Err(ApiError::NotFound(format!("Training module not found: {}", module_id))),
    }

    db::training::complete_module(&state.db, caller.user_id, module_id, state.clock.now()).await?;
    info!(user_id = %caller.user_id, module_id = %module_id, "Training module completed");

    let modules = db::training::list_active_with_progress(&state.db, caller.user_id).await?;
    Ok(Json(modules))
}

/// POST /modules/skip
///
/// An empty body means `{"skip": true}`.
pub async fn skip_tutorial(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<SkipRequest>, JsonRejection>,
) -> ApiResult<Json<GateDecision>> {
    let skip = match body {
        Ok(Json(request)) => request.skip,
        Err(JsonRejection::MissingJsonContentType(_)) => true,
        Err(e) => return Err(e.into()),
    };

    db::users::set_skip_tutorial(&state.db, caller.user_id, skip).await?;
    info!(user_id = %caller.user_id, skip, "Skip-tutorial flag updated");

    Ok(Json(state.gate.is_allowed_to_start(caller.user_id).await?))
}

/// GET /modules/gate
pub async fn gate_status(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Json<GateDecision>> {
    Ok(Json(state.gate.is_allowed_to_start(caller.user_id).await?))
}

/// Build training routes
pub fn training_routes() -> Router<AppState> {
    Router::new()
        .route("/modules", get(list_modules))
        .route("/modules/gate", get(gate_status))
        .route("/modules/skip", post(skip_tutorial))
        .route("/modules/:id/complete", post(complete_module))
}
