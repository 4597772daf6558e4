#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::Value;

use adaptive_backend::auth::{sign_token, Role, TokenKind};
use adaptive_backend::config::Config;
use adaptive_backend::services::llm_provider::{LLMConfig, LLMProvider};

pub const TEST_SECRET: &str = "integration-test-secret";

/// App with auth configured but no database and no model key.
pub fn create_test_app() -> Router {
    let config = Config {
        jwt_secret: Some(TEST_SECRET.to_string()),
        ..Config::default()
    };
    let llm = LLMProvider::new(LLMConfig {
        api_key: None,
        model: "test-model".to_string(),
        api_endpoint: "http://127.0.0.1:9".to_string(),
        timeout: Duration::from_millis(200),
        max_tokens: 100,
    });

    adaptive_backend::create_app_with(config, None, Arc::new(llm))
}

pub fn token_at(role: Role, kind: TokenKind, secret: &str, now: DateTime<Utc>) -> String {
    let (token, _) = sign_token(secret, 1, role, kind, chrono::Duration::minutes(30), now)
        .expect("sign test token");
    token
}

pub fn access_token(role: Role) -> String {
    token_at(role, TokenKind::Access, TEST_SECRET, Utc::now())
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("build request")
}

pub fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("build request")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}
