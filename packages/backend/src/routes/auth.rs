use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{self, AuthError, AuthUser, Role, TokenKind};
use crate::db::operations::{sessions, users};
use crate::db::DatabaseProxy;
use crate::response::{ok, AppError};
use crate::state::AppState;

use super::{optional_text, require_text};

const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 100;
const NAME_MAX_LEN: usize = 100;
const EMAIL_MAX_LEN: usize = 255;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_student))
        .route("/register/teacher", post(register_teacher))
        .route("/register/parent", post(register_parent))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}

#[derive(Debug, Deserialize)]
pub(super) struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        require_text("first_name", &self.first_name, NAME_MAX_LEN)?;
        require_text("last_name", &self.last_name, NAME_MAX_LEN)?;
        optional_text("middle_name", self.middle_name.as_deref(), NAME_MAX_LEN)
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

pub(super) fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let valid = email.len() <= EMAIL_MAX_LEN
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };
    if valid {
        Ok(())
    } else {
        Err(AppError::validation("Invalid email address"))
    }
}

pub(super) fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(AppError::validation(format!(
            "Password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
        )));
    }
    Ok(())
}

/// Insert a user after checking the email is free. Shared with admin user creation.
pub(super) async fn create_user(
    proxy: &DatabaseProxy,
    payload: &RegisterRequest,
    role: Role,
) -> Result<users::UserResponse, AppError> {
    let email = payload.email.trim();
    if users::find_by_email(proxy, email).await?.is_some() {
        return Err(AppError::conflict("A user with this email already exists"));
    }

    let hashed_password = auth::hash_password(&payload.password)?;
    let row = users::insert(
        proxy,
        &users::NewUser {
            email,
            hashed_password: &hashed_password,
            first_name: payload.first_name.trim(),
            last_name: payload.last_name.trim(),
            middle_name: payload.middle_name.as_deref().map(str::trim),
            role,
        },
    )
    .await?;

    tracing::info!(user_id = row.id, role = role.as_str(), "user registered");
    Ok(row.into())
}

async fn register_as(
    state: AppState,
    payload: RegisterRequest,
    role: Role,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let proxy = state.require_db()?;
    let user = create_user(&proxy, &payload, role).await?;
    Ok((StatusCode::CREATED, ok(user)))
}

async fn register_student(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    register_as(state, payload, Role::Student).await
}

async fn register_teacher(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    register_as(state, payload, Role::Teacher).await
}

async fn register_parent(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    register_as(state, payload, Role::Parent).await
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;

    let user = users::find_by_email(&proxy, payload.email.trim())
        .await?
        .filter(|user| auth::verify_password(&payload.password, &user.hashed_password))
        .ok_or(AuthError::InvalidCredentials)?;
    if !user.is_active {
        return Err(AuthError::InactiveUser.into());
    }

    let issued = auth::issue_tokens(state.config(), user.id, user.role())?;
    sessions::insert(&proxy, &issued.refresh_hash, user.id, issued.refresh_expires_at).await?;

    tracing::info!(user_id = user.id, "user logged in");
    Ok(ok(issued.pair))
}

async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let secret = state
        .config()
        .jwt_secret
        .as_deref()
        .ok_or(AuthError::MissingSecret)?;
    let claims = auth::verify_token(&payload.refresh_token, secret, TokenKind::Refresh, Utc::now())?;
    let user_id = claims.user_id()?;

    let proxy = state.require_db()?;
    let owner = sessions::take(&proxy, &auth::hash_token(&payload.refresh_token)).await?;
    if owner != Some(user_id) {
        tracing::warn!(user_id, "refresh token reuse or unknown session");
        return Err(AuthError::InvalidToken.into());
    }

    let user = users::find_by_id(&proxy, user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or(AuthError::InactiveUser)?;

    let issued = auth::issue_tokens(state.config(), user.id, user.role())?;
    sessions::insert(&proxy, &issued.refresh_hash, user.id, issued.refresh_expires_at).await?;

    Ok(ok(issued.pair))
}

async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let revoked = sessions::delete(&proxy, &auth::hash_token(&payload.refresh_token)).await?;
    Ok(ok(json!({ "revoked": revoked })))
}

pub(super) async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let row = users::find_by_id(&proxy, user.id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;
    Ok(ok(users::UserResponse::from(row)))
}
