use chrono::{DateTime, Utc};

use crate::db::DatabaseProxy;

pub async fn insert(
    proxy: &DatabaseProxy,
    token_hash: &str,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO refresh_sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(proxy.pool())
        .await?;
    Ok(())
}

/// Remove a live session and return its owner. Expired or unknown hashes yield `None`.
pub async fn take(proxy: &DatabaseProxy, token_hash: &str) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "DELETE FROM refresh_sessions WHERE token_hash = $1 AND expires_at > NOW() RETURNING user_id",
    )
    .bind(token_hash)
    .fetch_optional(proxy.pool())
    .await
}

pub async fn delete(proxy: &DatabaseProxy, token_hash: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM refresh_sessions WHERE token_hash = $1")
        .bind(token_hash)
        .execute(proxy.pool())
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn purge_expired(proxy: &DatabaseProxy) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM refresh_sessions WHERE expires_at <= NOW()")
        .execute(proxy.pool())
        .await?;
    Ok(result.rows_affected())
}
