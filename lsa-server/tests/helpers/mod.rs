//! Shared fixtures for lsa-server integration tests
//!
//! Each test gets its own SQLite file in a temp directory, a manually driven
//! clock and an in-process router.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use lsa_common::config::ReportingConfig;
use lsa_common::db::init_database;
use lsa_common::{Clock, ManualClock};
use lsa_server::models::AiMetrics;
use lsa_server::services::{
    ClassifierError, ExtractorError, NameGroup, ProductClassifier, Screenshot, ScreenshotExtractor,
    SimilarityClassifier, SqliteTrainingGate,
};
use lsa_server::{build_router, AppState, Collaborators};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Classifier that returns a fixed grouping for whichever names it knows
pub struct FixedClassifier {
    groups: Vec<NameGroup>,
    pub calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(groups: &[(&str, &[&str])]) -> Self {
        Self {
            groups: groups
                .iter()
                .map(|(canonical, names)| NameGroup {
                    canonical_name: canonical.to_string(),
                    names: names.iter().map(|n| n.to_string()).collect(),
                })
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProductClassifier for FixedClassifier {
    async fn classify(&self, names: &[String]) -> Result<Vec<NameGroup>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .groups
            .iter()
            .map(|group| NameGroup {
                canonical_name: group.canonical_name.clone(),
                names: group
                    .names
                    .iter()
                    .filter(|n| names.contains(n))
                    .cloned()
                    .collect(),
            })
            .filter(|group| !group.names.is_empty())
            .collect())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Classifier that always fails
pub struct FailingClassifier;

#[async_trait]
impl ProductClassifier for FailingClassifier {
    async fn classify(&self, _names: &[String]) -> Result<Vec<NameGroup>, ClassifierError> {
        Err(ClassifierError::Api("service unavailable".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Local similarity grouping after a delay, counting calls
pub struct SlowClassifier {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl SlowClassifier {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProductClassifier for SlowClassifier {
    async fn classify(&self, names: &[String]) -> Result<Vec<NameGroup>, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(SimilarityClassifier::group(names))
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Fresh service instance backed by a temp database
/// Extractor that reports fixed metrics and counts how often it is asked
pub struct CountingExtractor {
    metrics: AiMetrics,
    pub calls: AtomicUsize,
}

impl CountingExtractor {
    pub fn new(metrics: AiMetrics) -> Self {
        Self {
            metrics,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ScreenshotExtractor for CountingExtractor {
    async fn extract(&self, _screenshots: &[Screenshot]) -> Result<AiMetrics, ExtractorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.metrics.clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
    pub clock: Arc<ManualClock>,
    _dir: TempDir,
}

/// 2024-05-01 20:00:00 UTC
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap()
}

pub async fn setup_app() -> TestApp {
    setup_app_with(Arc::new(SimilarityClassifier), Duration::from_secs(5)).await
}

pub async fn setup_app_with(classifier: Arc<dyn ProductClassifier>, classifier_timeout: Duration) -> TestApp {
    build_app(classifier, classifier_timeout, None).await
}

pub async fn setup_app_with_extractor(extractor: Arc<dyn ScreenshotExtractor>) -> TestApp {
    build_app(Arc::new(SimilarityClassifier), Duration::from_secs(5), Some(extractor)).await
}

async fn build_app(
    classifier: Arc<dyn ProductClassifier>,
    classifier_timeout: Duration,
    extractor: Option<Arc<dyn ScreenshotExtractor>>,
) -> TestApp {
    let dir = TempDir::new().expect("Should create temp dir");
    let db = init_database(&dir.path().join("lsa.db"))
        .await
        .expect("Should initialize database");
    let clock = Arc::new(ManualClock::new(base_time()));

    let collaborators = Collaborators {
        gate: Arc::new(SqliteTrainingGate::new(db.clone())),
        classifier,
        classifier_timeout,
        extractor,
    };
    let state = AppState::new(
        db.clone(),
        Arc::clone(&clock) as Arc<dyn Clock>,
        collaborators,
        ReportingConfig::default(),
    );

    TestApp {
        router: build_router(state),
        db,
        clock,
        _dir: dir,
    }
}

/// Build a request as `user`, with an optional JSON body
pub fn test_request(method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Send a request and return status plus JSON body (`Null` for empty bodies)
pub async fn send(app: &TestApp, request: Request<Body>) -> (axum::http::StatusCode, Value) {
    use tower::util::ServiceExt;

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, body)
}

/// Start a live for `user` and return its id
pub async fn start_live(app: &TestApp, user: Uuid, followers: i64, coins: f64) -> Uuid {
    let (status, body) = send(
        app,
        test_request(
            "POST",
            "/sessions/start",
            Some(user),
            Some(serde_json::json!({"followersStart": followers, "coinsStart": coins})),
        ),
    )
    .await;
    assert_eq!(status, axum::http::StatusCode::CREATED, "start failed: {}", body);
    body["id"].as_str().unwrap().parse().unwrap()
}

/// Create a report and return its id
pub async fn create_report(app: &TestApp, user: Uuid, report: Value) -> Uuid {
    let (status, body) = send(app, test_request("POST", "/reports", Some(user), Some(report))).await;
    assert_eq!(status, axum::http::StatusCode::CREATED, "create report failed: {}", body);
    body["id"].as_str().unwrap().parse().unwrap()
}

/// Product rows of a listing, keyed by name
pub fn products_by_name(listing: &Value) -> HashMap<String, Value> {
    listing["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| (item["name"].as_str().unwrap().to_string(), item.clone()))
        .collect()
}
