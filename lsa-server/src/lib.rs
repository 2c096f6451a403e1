//! lsa-server library - live-selling analytics service
//!
//! Session lifecycle, report aggregation and product deduplication behind
//! an axum HTTP API. Exposed as a library for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use lsa_common::config::ReportingConfig;
use lsa_common::Clock;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::services::{
    ClassifierFlights, ProductClassifier, ProductDeduplicator, ReportAggregator, ReportEditor,
    ScreenshotExtractor, SessionLifecycle, TrainingGate,
};

/// External collaborators the service depends on
pub struct Collaborators {
    pub gate: Arc<dyn TrainingGate>,
    pub classifier: Arc<dyn ProductClassifier>,
    /// Upper bound for one classifier call
    pub classifier_timeout: Duration,
    /// `None` when no extraction endpoint is configured
    pub extractor: Option<Arc<dyn ScreenshotExtractor>>,
}

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub clock: Arc<dyn Clock>,
    pub gate: Arc<dyn TrainingGate>,
    pub sessions: Arc<SessionLifecycle>,
    pub reports: Arc<ReportAggregator>,
    pub editor: Arc<ReportEditor>,
    pub dedup: Arc<ProductDeduplicator>,
    pub extractor: Option<Arc<dyn ScreenshotExtractor>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        clock: Arc<dyn Clock>,
        collaborators: Collaborators,
        reporting: ReportingConfig,
    ) -> Self {
        let Collaborators {
            gate,
            classifier,
            classifier_timeout,
            extractor,
        } = collaborators;

        let flights = Arc::new(ClassifierFlights::new());
        Self {
            sessions: Arc::new(SessionLifecycle::new(db.clone(), Arc::clone(&gate), Arc::clone(&clock))),
            reports: Arc::new(ReportAggregator::new(db.clone(), Arc::clone(&clock), reporting)),
            editor: Arc::new(ReportEditor::new(db.clone(), Arc::clone(&clock))),
            dedup: Arc::new(ProductDeduplicator::new(
                db.clone(),
                Arc::clone(&clock),
                classifier,
                flights,
                classifier_timeout,
            )),
            startup_time: clock.now(),
            db,
            clock,
            gate,
            extractor,
        }
    }
}

/// Build application router
///
/// `/health` is public; every other route requires a caller identity.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = Router::new()
        .merge(api::session_routes())
        .merge(api::report_routes())
        .merge(api::training_routes())
        .merge(api::activity_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::identity_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
