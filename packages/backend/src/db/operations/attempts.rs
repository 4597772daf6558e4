use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

use adaptive_algo::AttemptRecord;

use crate::db::DatabaseProxy;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AttemptRow {
    pub id: i64,
    pub task_id: i64,
    pub student_id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub is_correct: Option<bool>,
    pub hints_used: i32,
    pub time_spent: Option<i32>,
    pub answers: Value,
    pub feedback: Option<Value>,
    pub scaffolding_level_used: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl AttemptRow {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn to_record(&self) -> AttemptRecord {
        AttemptRecord {
            id: self.id,
            task_id: self.task_id,
            started_at: self.started_at,
            completed_at: self.completed_at,
            score: self.score,
            is_correct: self.is_correct,
            hints_used: u32::try_from(self.hints_used).unwrap_or(0),
            time_spent: self.time_spent.and_then(|t| u32::try_from(t).ok()),
        }
    }
}

/// Outcome of a submission, already validated by the core record.
pub struct Submission<'a> {
    pub completed_at: DateTime<Utc>,
    pub score: Option<f64>,
    pub is_correct: Option<bool>,
    pub time_spent: Option<i32>,
    pub answers: &'a Value,
}

#[derive(Debug, Default)]
pub struct AttemptReview {
    pub score: Option<f64>,
    pub is_correct: Option<bool>,
    pub feedback: Option<Value>,
}

pub async fn find(proxy: &DatabaseProxy, id: i64) -> Result<Option<AttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>("SELECT * FROM task_attempts WHERE id = $1")
        .bind(id)
        .fetch_optional(proxy.pool())
        .await
}

pub async fn list_for_task(proxy: &DatabaseProxy, task_id: i64) -> Result<Vec<AttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>(
        "SELECT * FROM task_attempts WHERE task_id = $1 ORDER BY started_at, id",
    )
    .bind(task_id)
    .fetch_all(proxy.pool())
    .await
}

pub async fn list_for_tasks(proxy: &DatabaseProxy, task_ids: &[i64]) -> Result<Vec<AttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>(
        "SELECT * FROM task_attempts WHERE task_id = ANY($1) ORDER BY started_at, id",
    )
    .bind(task_ids)
    .fetch_all(proxy.pool())
    .await
}

pub async fn list_for_student(
    proxy: &DatabaseProxy,
    student_id: i64,
    skip: i64,
    limit: i64,
) -> Result<Vec<AttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>(
        r#"
        SELECT * FROM task_attempts
        WHERE student_id = $1
        ORDER BY started_at DESC, id DESC
        OFFSET $2 LIMIT $3
        "#,
    )
    .bind(student_id)
    .bind(skip)
    .bind(limit)
    .fetch_all(proxy.pool())
    .await
}

/// Attempts started in `[from, to)`.
pub async fn list_for_student_between(
    proxy: &DatabaseProxy,
    student_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<AttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>(
        r#"
        SELECT * FROM task_attempts
        WHERE student_id = $1 AND started_at >= $2 AND started_at < $3
        ORDER BY started_at, id
        "#,
    )
    .bind(student_id)
    .bind(from)
    .bind(to)
    .fetch_all(proxy.pool())
    .await
}

pub async fn insert(
    proxy: &DatabaseProxy,
    task_id: i64,
    student_id: i64,
    scaffolding_level_used: Option<i32>,
) -> Result<AttemptRow, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>(
        r#"
        INSERT INTO task_attempts (task_id, student_id, scaffolding_level_used)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(task_id)
    .bind(student_id)
    .bind(scaffolding_level_used)
    .fetch_one(proxy.pool())
    .await
}

/// Write a submission once. `None` means the attempt was completed concurrently.
pub async fn record_submission(
    proxy: &DatabaseProxy,
    id: i64,
    submission: &Submission<'_>,
) -> Result<Option<AttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>(
        r#"
        UPDATE task_attempts SET
            completed_at = $2,
            score = $3,
            is_correct = $4,
            time_spent = $5,
            answers = $6
        WHERE id = $1 AND completed_at IS NULL
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(submission.completed_at)
    .bind(submission.score)
    .bind(submission.is_correct)
    .bind(submission.time_spent)
    .bind(submission.answers)
    .fetch_optional(proxy.pool())
    .await
}

pub async fn increment_hints(proxy: &DatabaseProxy, id: i64) -> Result<Option<AttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>(
        r#"
        UPDATE task_attempts SET hints_used = hints_used + 1
        WHERE id = $1 AND completed_at IS NULL
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(proxy.pool())
    .await
}

pub async fn review(
    proxy: &DatabaseProxy,
    id: i64,
    review: &AttemptReview,
) -> Result<Option<AttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRow>(
        r#"
        UPDATE task_attempts SET
            score = COALESCE($2, score),
            is_correct = COALESCE($3, is_correct),
            feedback = COALESCE($4, feedback)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(review.score)
    .bind(review.is_correct)
    .bind(review.feedback.as_ref())
    .fetch_optional(proxy.pool())
    .await
}
