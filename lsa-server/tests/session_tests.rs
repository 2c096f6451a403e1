//! Integration tests for the live session lifecycle
//!
//! Tests cover:
//! - Scheduling, starting (new and promoted) and finishing sessions
//! - Derived finish fields
//! - Status-guarded transitions under concurrency
//! - Training gate denial
//! - Caller identity and ownership scoping

mod helpers;

use axum::http::StatusCode;
use chrono::Duration;
use helpers::{send, setup_app, setup_app_with_extractor, start_live, test_request, CountingExtractor};
use lsa_server::db;
use lsa_server::models::{AiMetrics, ModuleStatus, TrainingModule};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

// =============================================================================
// Identity and Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_identity_required() {
    let app = setup_app().await;

    let (status, body) = send(&app, test_request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "lsa-server");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_missing_identity_rejected() {
    let app = setup_app().await;

    let (status, body) = send(&app, test_request("GET", "/sessions", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_malformed_identity_rejected() {
    let app = setup_app().await;

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/sessions")
        .header("x-user-id", "not-a-uuid")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Scheduling
// =============================================================================

#[tokio::test]
async fn test_scheduled_session_listed_without_start_fields() {
    let app = setup_app().await;
    let user = Uuid::new_v4();

    let (status, created) = send(
        &app,
        test_request(
            "POST",
            "/sessions/schedule",
            Some(user),
            Some(json!({
                "title": "Sale Night",
                "scheduledAt": "2024-05-03T21:00:00Z",
                "products": [{"name": "Kit 3 Camisetas", "price": 89.9}]
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "SCHEDULED");

    let (status, body) = send(&app, test_request("GET", "/sessions/scheduled", Some(user), None)).await;

    assert_eq!(status, StatusCode::OK);
    let sessions = body.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["title"], "Sale Night");
    assert_eq!(sessions[0]["status"], "SCHEDULED");
    assert!(sessions[0]["followersStart"].is_null());
    assert_eq!(sessions[0]["products"][0]["name"], "Kit 3 Camisetas");
}

#[tokio::test]
async fn test_schedule_requires_title() {
    let app = setup_app().await;
    let user = Uuid::new_v4();

    let (status, body) = send(
        &app,
        test_request(
            "POST",
            "/sessions/schedule",
            Some(user),
            Some(json!({"title": "  ", "scheduledAt": "2024-05-03T21:00:00Z"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_update_and_delete_scheduled() {
    let app = setup_app().await;
    let user = Uuid::new_v4();

    let (_, created) = send(
        &app,
        test_request(
            "POST",
            "/sessions/schedule",
            Some(user),
            Some(json!({"title": "Draft", "scheduledAt": "2024-05-03T21:00:00Z"})),
        ),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &app,
        test_request(
            "PUT",
            &format!("/sessions/scheduled/{}", id),
            Some(user),
            Some(json!({"title": "Weekend Drop", "products": [{"name": "Bone"}, {"name": "Meia"}]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Weekend Drop");
    assert_eq!(updated["products"].as_array().unwrap().len(), 2);

    let (status, _) = send(
        &app,
        test_request("DELETE", &format!("/sessions/scheduled/{}", id), Some(user), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, test_request("GET", &format!("/sessions/{}", id), Some(user), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Start and Finish
// =============================================================================

#[tokio::test]
async fn test_finish_derives_duration_followers_and_coins() {
    let app = setup_app().await;
    let user = Uuid::new_v4();

    let id = start_live(&app, user, 1000, 50.0).await;
    app.clock.advance(Duration::minutes(45));

    let (status, body) = send(
        &app,
        test_request(
            "POST",
            &format!("/sessions/{}/finish", id),
            Some(user),
            Some(json!({"followersEnd": 1200, "coinsEnd": 10.0})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "FINISHED");
    assert_eq!(body["followersGained"], 200);
    assert_eq!(body["coinsSpent"].as_f64().unwrap(), 40.0);
    assert_eq!(body["durationMinutes"], 45);
    assert!(body["finishedAt"].is_string());
}

#[tokio::test]
async fn test_finish_keeps_losses_unclamped() {
    let app = setup_app().await;
    let user = Uuid::new_v4();

    let id = start_live(&app, user, 1000, 10.0).await;
    app.clock.advance(Duration::minutes(10));

    let (status, body) = send(
        &app,
        test_request(
            "POST",
            &format!("/sessions/{}/finish", id),
            Some(user),
            Some(json!({"followersEnd": 990, "coinsEnd": 25.0})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["followersGained"], -10);
    assert_eq!(body["coinsSpent"].as_f64().unwrap(), -15.0);
}

#[tokio::test]
async fn test_finish_records_explicit_ai_metrics() {
    let app = setup_app().await;
    let user = Uuid::new_v4();

    let id = start_live(&app, user, 10, 0.0).await;
    let (status, body) = send(
        &app,
        test_request(
            "POST",
            &format!("/sessions/{}/finish", id),
            Some(user),
            Some(json!({"followersEnd": 12, "coinsEnd": 0.0, "likes": 340, "engagementRate": 4.5})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likes"], 340);
    assert_eq!(body["engagementRate"].as_f64().unwrap(), 4.5);
    assert!(body["shares"].is_null());
}

#[tokio::test]
async fn test_finish_accepts_multipart_form() {
    let app = setup_app().await;
    let user = Uuid::new_v4();
    let id = start_live(&app, user, 100, 5.0).await;

    let boundary = "lsa-test-boundary";
    let form = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"followersEnd\"\r\n\r\n130\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"coinsEnd\"\r\n\r\n2.5\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"views\"\r\n\r\n\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let request = axum::http::Request::builder()
        .method("POST")
        .uri(format!("/sessions/{}/finish", id))
        .header("x-user-id", user.to_string())
        .header(
            axum::http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(axum::body::Body::from(form))
        .unwrap();

    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["followersGained"], 30);
    assert_eq!(body["coinsSpent"].as_f64().unwrap(), 2.5);
    assert!(body["views"].is_null());
}

/// Multipart finish carrying one screenshot file
fn finish_with_screenshot(session_id: Uuid, user: Uuid) -> axum::http::Request<axum::body::Body> {
    let boundary = "lsa-test-boundary";
    let form = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"followersEnd\"\r\n\r\n120\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"coinsEnd\"\r\n\r\n4\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"screenshots\"; filename=\"end.png\"\r\n\
         Content-Type: image/png\r\n\r\nnot-really-a-png\r\n\
         --{b}--\r\n",
        b = boundary
    );
    axum::http::Request::builder()
        .method("POST")
        .uri(format!("/sessions/{}/finish", session_id))
        .header("x-user-id", user.to_string())
        .header(
            axum::http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(axum::body::Body::from(form))
        .unwrap()
}

#[tokio::test]
async fn test_finish_merges_screenshot_metrics() {
    let extractor = Arc::new(CountingExtractor::new(AiMetrics {
        likes: Some(42),
        views: Some(900),
        ..Default::default()
    }));
    let app = setup_app_with_extractor(extractor.clone()).await;
    let user = Uuid::new_v4();
    let id = start_live(&app, user, 100, 5.0).await;

    let (status, body) = send(&app, finish_with_screenshot(id, user)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["likes"], 42);
    assert_eq!(body["views"], 900);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_finish_never_reaches_extractor() {
    let extractor = Arc::new(CountingExtractor::new(AiMetrics::default()));
    let app = setup_app_with_extractor(extractor.clone()).await;
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let id = start_live(&app, owner, 100, 5.0).await;

    let (status, _) = send(&app, finish_with_screenshot(id, stranger)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);

    let (status, _) = send(&app, finish_with_screenshot(id, owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

    // Already FINISHED
    let (status, _) = send(&app, finish_with_screenshot(id, owner)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_finish_conflicts() {
    let app = setup_app().await;
    let user = Uuid::new_v4();
    let id = start_live(&app, user, 10, 1.0).await;
    let finish = json!({"followersEnd": 11, "coinsEnd": 0.5});

    let (first, _) = send(
        &app,
        test_request("POST", &format!("/sessions/{}/finish", id), Some(user), Some(finish.clone())),
    )
    .await;
    let (second, body) = send(
        &app,
        test_request("POST", &format!("/sessions/{}/finish", id), Some(user), Some(finish)),
    )
    .await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_concurrent_finish_exactly_one_succeeds() {
    let app = setup_app().await;
    let user = Uuid::new_v4();
    let id = start_live(&app, user, 1000, 50.0).await;
    app.clock.advance(Duration::minutes(30));

    let finish_request = |followers: i64| {
        test_request(
            "POST",
            &format!("/sessions/{}/finish", id),
            Some(user),
            Some(json!({"followersEnd": followers, "coinsEnd": 10.0})),
        )
    };
    let (a, b) = tokio::join!(
        app.router.clone().oneshot(finish_request(1100)),
        app.router.clone().oneshot(finish_request(1200)),
    );
    let mut statuses = vec![a.unwrap().status(), b.unwrap().status()];
    statuses.sort();

    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let (_, session) = send(&app, test_request("GET", &format!("/sessions/{}", id), Some(user), None)).await;
    assert_eq!(session["status"], "FINISHED");
    let gained = session["followersGained"].as_i64().unwrap();
    let end = session["followersEnd"].as_i64().unwrap();
    assert_eq!(gained, end - 1000);
}

#[tokio::test]
async fn test_start_promotes_scheduled_session() {
    let app = setup_app().await;
    let user = Uuid::new_v4();

    let (_, scheduled) = send(
        &app,
        test_request(
            "POST",
            "/sessions/schedule",
            Some(user),
            Some(json!({"title": "Sale Night", "scheduledAt": "2024-05-01T21:00:00Z"})),
        ),
    )
    .await;
    let scheduled_id = scheduled["id"].as_str().unwrap();

    let (status, live) = send(
        &app,
        test_request(
            "POST",
            "/sessions/start",
            Some(user),
            Some(json!({"followersStart": 500, "coinsStart": 20.0, "scheduledSessionId": scheduled_id})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(live["id"], scheduled_id);
    assert_eq!(live["status"], "IN_PROGRESS");
    assert_eq!(live["title"], "Sale Night");
    assert_eq!(live["followersStart"], 500);

    let (_, remaining) = send(&app, test_request("GET", "/sessions/scheduled", Some(user), None)).await;
    assert!(remaining.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_one_live_per_owner() {
    let app = setup_app().await;
    let user = Uuid::new_v4();
    start_live(&app, user, 10, 1.0).await;

    let (status, body) = send(
        &app,
        test_request(
            "POST",
            "/sessions/start",
            Some(user),
            Some(json!({"followersStart": 10, "coinsStart": 1.0})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_active_session_lookup() {
    let app = setup_app().await;
    let user = Uuid::new_v4();

    let (status, _) = send(&app, test_request("GET", "/sessions/active", Some(user), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let id = start_live(&app, user, 10, 1.0).await;
    let (status, body) = send(&app, test_request("GET", "/sessions/active", Some(user), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.to_string());
}

#[tokio::test]
async fn test_live_patch_updates_in_progress_only() {
    let app = setup_app().await;
    let user = Uuid::new_v4();
    let id = start_live(&app, user, 10, 1.0).await;

    let (status, body) = send(
        &app,
        test_request(
            "PATCH",
            &format!("/sessions/{}", id),
            Some(user),
            Some(json!({"peakViewers": 870, "notes": "flash sale at 21h"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["peakViewers"], 870);
    assert_eq!(body["notes"], "flash sale at 21h");

    send(
        &app,
        test_request(
            "POST",
            &format!("/sessions/{}/finish", id),
            Some(user),
            Some(json!({"followersEnd": 10, "coinsEnd": 1.0})),
        ),
    )
    .await;

    let (status, _) = send(
        &app,
        test_request("PATCH", &format!("/sessions/{}", id), Some(user), Some(json!({"peakViewers": 1}))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_sessions_scoped_to_owner() {
    let app = setup_app().await;
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let id = start_live(&app, owner, 10, 1.0).await;

    let (status, _) = send(&app, test_request("GET", &format!("/sessions/{}", id), Some(stranger), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        test_request(
            "POST",
            &format!("/sessions/{}/finish", id),
            Some(stranger),
            Some(json!({"followersEnd": 20, "coinsEnd": 0.0})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = send(&app, test_request("GET", "/sessions", Some(stranger), None)).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_start_rejects_negative_followers() {
    let app = setup_app().await;
    let user = Uuid::new_v4();

    let (status, body) = send(
        &app,
        test_request(
            "POST",
            "/sessions/start",
            Some(user),
            Some(json!({"followersStart": -1, "coinsStart": 0.0})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

// =============================================================================
// Training Gate
// =============================================================================

#[tokio::test]
async fn test_start_denied_until_training_complete() {
    let app = setup_app().await;
    let user = Uuid::new_v4();

    for position in 0..3 {
        let module = TrainingModule {
            id: Uuid::new_v4(),
            title: format!("Module {}", position + 1),
            position,
            status: ModuleStatus::Active,
        };
        db::training::insert_module(&app.db, &module, helpers::base_time())
            .await
            .unwrap();
    }
    db::users::ensure_user(&app.db, user, helpers::base_time()).await.unwrap();
    let modules = db::training::list_active_with_progress(&app.db, user).await.unwrap();
    for module in modules.iter().take(2) {
        db::training::complete_module(&app.db, user, module.module.id, helpers::base_time())
            .await
            .unwrap();
    }

    let start = json!({"followersStart": 10, "coinsStart": 1.0});
    let (status, body) = send(&app, test_request("POST", "/sessions/start", Some(user), Some(start.clone()))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "TRAINING_INCOMPLETE");
    assert_eq!(body["completed"], 2);
    assert_eq!(body["total"], 3);

    let (_, listed) = send(&app, test_request("GET", "/sessions", Some(user), None)).await;
    assert!(listed.as_array().unwrap().is_empty());

    db::training::complete_module(&app.db, user, modules[2].module.id, helpers::base_time())
        .await
        .unwrap();
    let (status, _) = send(&app, test_request("POST", "/sessions/start", Some(user), Some(start))).await;
    assert_eq!(status, StatusCode::CREATED);
}
