mod auth;
mod generation;
mod health;
mod iep;
mod progress;
mod students;
mod tasks;
mod users;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use adaptive_algo::{DifficultyLevel, Subject};

use crate::middleware::auth::require_auth;
use crate::response::{json_error, AppError};
use crate::state::AppState;

const DEFAULT_PAGE_LIMIT: i64 = 100;
const MAX_PAGE_LIMIT: i64 = 100;

pub fn router(state: AppState) -> Router {
    let prefix = state.config().api_prefix.clone();

    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .nest("/users", users::router())
        .nest("/students", students::router())
        .nest("/iep", iep::router())
        .nest("/tasks", tasks::router())
        .nest("/progress", progress::router())
        .nest("/generate", generation::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .route("/ping", get(ping))
        .nest("/auth", auth::router())
        .merge(protected);

    Router::new()
        .nest("/health", health::router())
        .nest(&prefix, api)
        .fallback(fallback_handler)
        .with_state(state)
}

async fn ping() -> Response {
    Json(json!({ "ping": "pong" })).into_response()
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Endpoint not found").into_response()
}

/// `skip`/`limit` query parameters shared by the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self { skip, limit }
    }

    /// `(skip, limit)`: skip >= 0, limit 1..=100, default 100.
    pub fn resolve(&self) -> Result<(i64, i64), AppError> {
        let skip = self.skip.unwrap_or(0);
        if skip < 0 {
            return Err(AppError::validation("skip must be non-negative"));
        }
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(AppError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok((skip, limit))
    }
}

/// Trimmed length check for required text fields.
pub(crate) fn require_text(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len == 0 || len > max {
        return Err(AppError::validation(format!(
            "{field} must be between 1 and {max} characters"
        )));
    }
    Ok(())
}

pub(crate) fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<(), AppError> {
    match value {
        Some(v) if v.chars().count() > max => Err(AppError::validation(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

pub(crate) fn parse_subject(raw: &str) -> Result<Subject, AppError> {
    Subject::parse(raw).ok_or_else(|| AppError::validation(format!("Unknown subject: {raw}")))
}

pub(crate) fn parse_difficulty(value: i32) -> Result<DifficultyLevel, AppError> {
    u8::try_from(value)
        .ok()
        .and_then(DifficultyLevel::from_value)
        .ok_or_else(|| AppError::validation("difficulty must be between 1 and 5"))
}
