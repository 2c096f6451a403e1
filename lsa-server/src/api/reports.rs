//! Reporting endpoints
//!
//! Aggregates: GET /reports/summary, /reports, /reports/products, /reports/ranking
//! Grouping: POST /reports/products/dedup, /reports/products/undo-dedup
//! Entry: POST /reports, GET/PUT/DELETE /reports/:id
//!
//! Every aggregate and grouping endpoint takes the same filter parameters
//! (`period` or `startDate`/`endDate`, `store`, `search`) in the query string.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use lsa_common::Ranked;
use uuid::Uuid;

use super::auth::Caller;
use crate::error::ApiResult;
use crate::models::{DedupResult, ProductSummary, ReportDetail, ReportInput, ReportRow, UndoResult};
use crate::pagination::Page;
use crate::services::report_aggregator::RankingEntry;
use crate::services::{ReportQuery, SummaryResponse};
use crate::AppState;

/// GET /reports/summary
pub async fn summary(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> ApiResult<Json<SummaryResponse>> {
    let Query(query) = query?;
    let scope = state.reports.scope(caller.user_id, &query)?;
    Ok(Json(state.reports.summarize(&scope).await?))
}

/// GET /reports
pub async fn list_reports(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> ApiResult<Json<Page<ReportRow>>> {
    let Query(query) = query?;
    let scope = state.reports.scope(caller.user_id, &query)?;
    Ok(Json(state.reports.list_reports(&scope, &query).await?))
}

/// GET /reports/products
pub async fn list_products(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> ApiResult<Json<Page<Ranked<ProductSummary>>>> {
    let Query(query) = query?;
    let scope = state.reports.scope(caller.user_id, &query)?;
    Ok(Json(state.reports.list_products(&scope, &query).await?))
}

/// GET /reports/ranking
pub async fn ranking(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Ranked<RankingEntry>>>> {
    let Query(query) = query?;
    let scope = state.reports.scope(caller.user_id, &query)?;
    Ok(Json(state.reports.ranking(&scope, &query).await?))
}

/// POST /reports/products/dedup
///
/// 502 UPSTREAM_UNAVAILABLE when the classifier fails; nothing is written.
pub async fn dedup_products(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> ApiResult<Json<DedupResult>> {
    let Query(query) = query?;
    let scope = state.reports.scope(caller.user_id, &query)?;
    Ok(Json(state.dedup.dedupe(&scope).await?))
}

/// POST /reports/products/undo-dedup
pub async fn undo_dedup(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> ApiResult<Json<UndoResult>> {
    let Query(query) = query?;
    let scope = state.reports.scope(caller.user_id, &query)?;
    Ok(Json(state.dedup.undo(&scope).await?))
}

/// POST /reports
pub async fn create_report(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<ReportInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ReportDetail>)> {
    let Json(input) = body?;
    let report = state.editor.create(caller.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /reports/:id
pub async fn get_report(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(report_id): Path<Uuid>,
) -> ApiResult<Json<ReportDetail>> {
    Ok(Json(state.editor.get(report_id, caller.user_id).await?))
}

/// PUT /reports/:id
pub async fn update_report(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(report_id): Path<Uuid>,
    body: Result<Json<ReportInput>, JsonRejection>,
) -> ApiResult<Json<ReportDetail>> {
    let Json(input) = body?;
    Ok(Json(state.editor.update(report_id, caller.user_id, input).await?))
}

/// DELETE /reports/:id
pub async fn delete_report(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(report_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.editor.delete(report_id, caller.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build reporting routes
pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/reports", get(list_reports).post(create_report))
        .route("/reports/summary", get(summary))
        .route("/reports/products", get(list_products))
        .route("/reports/products/dedup", post(dedup_products))
        .route("/reports/products/undo-dedup", post(undo_dedup))
        .route("/reports/ranking", get(ranking))
        .route(
            "/reports/:id",
            get(get_report).put(update_report).delete(delete_report),
        )
}
