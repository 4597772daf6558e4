use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;

use adaptive_backend::auth::{Role, TokenKind};
use adaptive_backend::config::Config;
use adaptive_backend::services::llm_provider::LLMProvider;

mod common;

use common::{access_token, body_json, get, post_json, token_at, TEST_SECRET};

#[tokio::test]
async fn test_health_root_without_database() {
    let app = common::create_test_app();

    let response = app.oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["database"], "disconnected");
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_health_live() {
    let app = common::create_test_app();

    let response = app.oneshot(get("/health/live", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ping() {
    let app = common::create_test_app();

    let response = app.oneshot(get("/api/v1/ping", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ping": "pong" }));
}

#[tokio::test]
async fn test_unknown_routes_are_json_404() {
    for uri in ["/api/v1/does-not-exist", "/nowhere"] {
        let app = common::create_test_app();
        let response = app.oneshot(get(uri, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}

#[tokio::test]
async fn test_unauthorized_without_token() {
    let app = common::create_test_app();

    let response = app.oneshot(get("/api/v1/auth/me", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_rejects_token_signed_with_other_secret() {
    let app = common::create_test_app();
    let token = token_at(Role::Admin, TokenKind::Access, "some-other-secret", Utc::now());

    let response = app
        .oneshot(get("/api/v1/students", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejects_expired_token() {
    let app = common::create_test_app();
    let token = token_at(
        Role::Admin,
        TokenKind::Access,
        TEST_SECRET,
        Utc::now() - Duration::hours(2),
    );

    let response = app
        .oneshot(get("/api/v1/students", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Authentication token has expired");
}

#[tokio::test]
async fn test_rejects_refresh_token_as_access() {
    let app = common::create_test_app();
    let token = token_at(Role::Admin, TokenKind::Refresh, TEST_SECRET, Utc::now());

    let response = app
        .oneshot(get("/api/v1/students", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let app = common::create_test_app();
    let token = access_token(Role::Student);

    let response = app
        .oneshot(post_json(
            "/api/v1/auth/refresh",
            None,
            json!({ "refresh_token": token }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_student_cannot_list_students() {
    let app = common::create_test_app();
    let token = access_token(Role::Student);

    let response = app
        .oneshot(get("/api/v1/students", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_non_parent_cannot_read_my_children() {
    let app = common::create_test_app();
    let token = access_token(Role::Teacher);

    let response = app
        .oneshot(get("/api/v1/students/my-children", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_student_cannot_generate_tasks() {
    let app = common::create_test_app();
    let token = access_token(Role::Student);

    let response = app
        .oneshot(post_json(
            "/api/v1/generate/task",
            Some(&token),
            json!({ "student_id": 1, "subject": "math", "topic": "fractions" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_parent_cannot_request_batch_summaries() {
    let app = common::create_test_app();
    let token = access_token(Role::Parent);

    let response = app
        .oneshot(get("/api/v1/progress/summaries?student_ids=1,2", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_recommendation_limit_out_of_range() {
    let app = common::create_test_app();
    let token = access_token(Role::Teacher);

    let response = app
        .oneshot(get(
            "/api/v1/progress/recommendations/1?limit=50",
            Some(&token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_subject_rejected() {
    let app = common::create_test_app();
    let token = access_token(Role::Teacher);

    let response = app
        .oneshot(get("/api/v1/progress/subject/1/alchemy", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_page_limit_validated() {
    let app = common::create_test_app();
    let token = access_token(Role::Admin);

    let response = app
        .oneshot(get("/api/v1/students?limit=0", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = common::create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/v1/auth/register",
            None,
            json!({
                "email": "ann@school.org",
                "password": "short",
                "first_name": "Ann",
                "last_name": "Lee"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_create_student_rejects_grade() {
    let app = common::create_test_app();
    let token = access_token(Role::Teacher);

    let response = app
        .oneshot(post_json(
            "/api/v1/students",
            Some(&token),
            json!({ "first_name": "Ann", "last_name": "Lee", "grade": 12 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_data_routes_unavailable_without_database() {
    let app = common::create_test_app();
    let token = access_token(Role::Teacher);

    let response = app
        .oneshot(get("/api/v1/students", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_login_unavailable_without_database() {
    let app = common::create_test_app();

    let response = app
        .oneshot(post_json(
            "/api/v1/auth/login",
            None,
            json!({ "email": "ann@school.org", "password": "password1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_protected_routes_need_configured_secret() {
    let app = adaptive_backend::create_app_with(
        Config::default(),
        None,
        Arc::new(LLMProvider::from_env()),
    );
    let token = access_token(Role::Admin);

    let response = app
        .oneshot(get("/api/v1/auth/me", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
