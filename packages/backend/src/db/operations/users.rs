use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::auth::Role;
use crate::db::DatabaseProxy;

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub hashed_password: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    /// Unknown role text reads as the least privileged role.
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::Student)
    }
}

/// Public view of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            role: row.role(),
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            middle_name: row.middle_name,
            is_active: row.is_active,
            is_verified: row.is_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub hashed_password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub middle_name: Option<&'a str>,
    pub role: Role,
}

#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

pub async fn find_by_id(proxy: &DatabaseProxy, id: i64) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(proxy.pool())
        .await
}

pub async fn find_by_email(proxy: &DatabaseProxy, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE lower(email) = lower($1)")
        .bind(email)
        .fetch_optional(proxy.pool())
        .await
}

pub async fn list(
    proxy: &DatabaseProxy,
    skip: i64,
    limit: i64,
    role: Option<Role>,
) -> Result<Vec<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        SELECT * FROM users
        WHERE ($1::text IS NULL OR role = $1)
        ORDER BY id
        OFFSET $2 LIMIT $3
        "#,
    )
    .bind(role.map(|r| r.as_str()))
    .bind(skip)
    .bind(limit)
    .fetch_all(proxy.pool())
    .await
}

pub async fn insert(proxy: &DatabaseProxy, user: &NewUser<'_>) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (email, hashed_password, first_name, last_name, middle_name, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user.email)
    .bind(user.hashed_password)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.middle_name)
    .bind(user.role.as_str())
    .fetch_one(proxy.pool())
    .await
}

pub async fn update(
    proxy: &DatabaseProxy,
    id: i64,
    changes: &UserChanges,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users SET
            email = COALESCE($2, email),
            hashed_password = COALESCE($3, hashed_password),
            first_name = COALESCE($4, first_name),
            last_name = COALESCE($5, last_name),
            middle_name = COALESCE($6, middle_name),
            role = COALESCE($7, role),
            is_active = COALESCE($8, is_active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(changes.email.as_deref())
    .bind(changes.hashed_password.as_deref())
    .bind(changes.first_name.as_deref())
    .bind(changes.last_name.as_deref())
    .bind(changes.middle_name.as_deref())
    .bind(changes.role.map(|r| r.as_str()))
    .bind(changes.is_active)
    .fetch_optional(proxy.pool())
    .await
}

pub async fn delete(proxy: &DatabaseProxy, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(proxy.pool())
        .await?;
    Ok(result.rows_affected() > 0)
}
