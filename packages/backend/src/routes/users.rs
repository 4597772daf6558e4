use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;

use crate::auth::{self, AuthUser, Role, ADMIN_ONLY, MANAGERS};
use crate::db::operations::users::{self, UserChanges, UserResponse};
use crate::response::{ok, AppError};
use crate::state::AppState;

use super::auth::{create_user, validate_email, validate_password, RegisterRequest};
use super::{optional_text, require_text, Pagination};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create))
        .route("/:id", get(get_user).put(update).delete(delete))
        .route("/:id/deactivate", post(deactivate))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    skip: Option<i64>,
    limit: Option<i64>,
    role: Option<Role>,
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    #[serde(flatten)]
    account: RegisterRequest,
    #[serde(default = "default_role")]
    role: Role,
}

fn default_role() -> Role {
    Role::Student
}

#[derive(Debug, Deserialize)]
struct UpdateUserRequest {
    email: Option<String>,
    password: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    middle_name: Option<String>,
    role: Option<Role>,
    is_active: Option<bool>,
}

impl UpdateUserRequest {
    fn validate(&self) -> Result<(), AppError> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        if let Some(first_name) = &self.first_name {
            require_text("first_name", first_name, 100)?;
        }
        if let Some(last_name) = &self.last_name {
            require_text("last_name", last_name, 100)?;
        }
        optional_text("middle_name", self.middle_name.as_deref(), 100)
    }
}

async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(MANAGERS)?;
    let (skip, limit) = Pagination::new(query.skip, query.limit).resolve()?;
    let proxy = state.require_db()?;

    let rows = users::list(&proxy, skip, limit, query.role).await?;
    let data: Vec<UserResponse> = rows.into_iter().map(UserResponse::from).collect();
    Ok(ok(data))
}

async fn get_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if user.id != id {
        user.require_role(MANAGERS)?;
    }
    let proxy = state.require_db()?;

    let row = users::find_by_id(&proxy, id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ok(UserResponse::from(row)))
}

async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(ADMIN_ONLY)?;
    payload.account.validate()?;
    let proxy = state.require_db()?;

    let created = create_user(&proxy, &payload.account, payload.role).await?;
    Ok((StatusCode::CREATED, ok(created)))
}

async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let is_admin = user.role == Role::Admin;
    if user.id != id && !is_admin {
        return Err(AppError::forbidden("Insufficient permissions"));
    }
    if !is_admin && (payload.role.is_some() || payload.is_active.is_some()) {
        return Err(AppError::forbidden("Only an administrator may change role or status"));
    }
    payload.validate()?;
    let proxy = state.require_db()?;

    if let Some(email) = payload.email.as_deref() {
        let taken = users::find_by_email(&proxy, email.trim())
            .await?
            .is_some_and(|existing| existing.id != id);
        if taken {
            return Err(AppError::conflict("A user with this email already exists"));
        }
    }

    let hashed_password = payload
        .password
        .as_deref()
        .map(auth::hash_password)
        .transpose()?;

    let changes = UserChanges {
        email: payload.email.map(|e| e.trim().to_string()),
        hashed_password,
        first_name: payload.first_name.map(|n| n.trim().to_string()),
        last_name: payload.last_name.map(|n| n.trim().to_string()),
        middle_name: payload.middle_name,
        role: payload.role,
        is_active: payload.is_active,
    };

    let row = users::update(&proxy, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ok(UserResponse::from(row)))
}

async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(ADMIN_ONLY)?;
    if user.id == id {
        return Err(AppError::bad_request("Administrators cannot delete themselves"));
    }
    let proxy = state.require_db()?;

    if !users::delete(&proxy, id).await? {
        return Err(AppError::not_found("User not found"));
    }
    tracing::info!(user_id = id, deleted_by = user.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn deactivate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(ADMIN_ONLY)?;
    let proxy = state.require_db()?;

    let changes = UserChanges {
        is_active: Some(false),
        ..UserChanges::default()
    };
    let row = users::update(&proxy, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ok(UserResponse::from(row)))
}
