use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

use adaptive_algo::{AttemptRecord, DifficultyLevel, Subject, TaskRecord, TaskStatus};

use crate::db::DatabaseProxy;

// ==================== Templates ====================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TemplateRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub subject: String,
    pub topic: String,
    pub subtopic: Option<String>,
    pub base_difficulty: i32,
    pub disability_types: Vec<String>,
    pub prompt_template: Option<String>,
    pub content: Value,
    pub is_ai_generated: bool,
    pub is_public: bool,
    pub created_by_id: Option<i64>,
    pub min_grade: i32,
    pub max_grade: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct TemplateFilter {
    pub subject: Option<Subject>,
    pub grade: Option<i32>,
    pub disability_type: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub description: Option<String>,
    pub subject: Subject,
    pub topic: String,
    pub subtopic: Option<String>,
    pub base_difficulty: DifficultyLevel,
    pub disability_types: Vec<String>,
    pub prompt_template: Option<String>,
    pub content: Value,
    pub is_public: bool,
    pub min_grade: i32,
    pub max_grade: i32,
}

#[derive(Debug, Default)]
pub struct TemplateChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub subject: Option<Subject>,
    pub topic: Option<String>,
    pub subtopic: Option<String>,
    pub base_difficulty: Option<DifficultyLevel>,
    pub disability_types: Option<Vec<String>>,
    pub prompt_template: Option<String>,
    pub content: Option<Value>,
    pub is_public: Option<bool>,
    pub min_grade: Option<i32>,
    pub max_grade: Option<i32>,
}

pub async fn list_templates(
    proxy: &DatabaseProxy,
    filter: &TemplateFilter,
    skip: i64,
    limit: i64,
) -> Result<Vec<TemplateRow>, sqlx::Error> {
    // an empty disability list means the template suits everyone
    sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT * FROM task_templates
        WHERE ($1::text IS NULL OR subject = $1)
          AND ($2::int IS NULL OR (min_grade <= $2 AND max_grade >= $2))
          AND ($3::text IS NULL OR $3 = ANY(disability_types) OR cardinality(disability_types) = 0)
          AND ($4::bool IS NULL OR is_public = $4)
        ORDER BY id
        OFFSET $5 LIMIT $6
        "#,
    )
    .bind(filter.subject.map(|s| s.as_str()))
    .bind(filter.grade)
    .bind(filter.disability_type.as_deref())
    .bind(filter.is_public)
    .bind(skip)
    .bind(limit)
    .fetch_all(proxy.pool())
    .await
}

pub async fn find_template(proxy: &DatabaseProxy, id: i64) -> Result<Option<TemplateRow>, sqlx::Error> {
    sqlx::query_as::<_, TemplateRow>("SELECT * FROM task_templates WHERE id = $1")
        .bind(id)
        .fetch_optional(proxy.pool())
        .await
}

pub async fn insert_template(
    proxy: &DatabaseProxy,
    template: &NewTemplate,
    created_by_id: i64,
) -> Result<TemplateRow, sqlx::Error> {
    sqlx::query_as::<_, TemplateRow>(
        r#"
        INSERT INTO task_templates (
            name, description, subject, topic, subtopic, base_difficulty, disability_types,
            prompt_template, content, is_public, created_by_id, min_grade, max_grade
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(&template.name)
    .bind(template.description.as_deref())
    .bind(template.subject.as_str())
    .bind(&template.topic)
    .bind(template.subtopic.as_deref())
    .bind(i32::from(template.base_difficulty.value()))
    .bind(&template.disability_types)
    .bind(template.prompt_template.as_deref())
    .bind(&template.content)
    .bind(template.is_public)
    .bind(created_by_id)
    .bind(template.min_grade)
    .bind(template.max_grade)
    .fetch_one(proxy.pool())
    .await
}

pub async fn update_template(
    proxy: &DatabaseProxy,
    id: i64,
    changes: &TemplateChanges,
) -> Result<Option<TemplateRow>, sqlx::Error> {
    sqlx::query_as::<_, TemplateRow>(
        r#"
        UPDATE task_templates SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            subject = COALESCE($4, subject),
            topic = COALESCE($5, topic),
            subtopic = COALESCE($6, subtopic),
            base_difficulty = COALESCE($7, base_difficulty),
            disability_types = COALESCE($8, disability_types),
            prompt_template = COALESCE($9, prompt_template),
            content = COALESCE($10, content),
            is_public = COALESCE($11, is_public),
            min_grade = COALESCE($12, min_grade),
            max_grade = COALESCE($13, max_grade),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(changes.name.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.subject.map(|s| s.as_str()))
    .bind(changes.topic.as_deref())
    .bind(changes.subtopic.as_deref())
    .bind(changes.base_difficulty.map(|d| i32::from(d.value())))
    .bind(changes.disability_types.as_deref())
    .bind(changes.prompt_template.as_deref())
    .bind(changes.content.as_ref())
    .bind(changes.is_public)
    .bind(changes.min_grade)
    .bind(changes.max_grade)
    .fetch_optional(proxy.pool())
    .await
}

pub async fn delete_template(proxy: &DatabaseProxy, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM task_templates WHERE id = $1")
        .bind(id)
        .execute(proxy.pool())
        .await?;
    Ok(result.rows_affected() > 0)
}

// ==================== Tasks ====================

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TaskRow {
    pub id: i64,
    pub title: String,
    pub template_id: Option<i64>,
    pub student_id: i64,
    pub iep_goal_id: Option<i64>,
    pub subject: String,
    pub topic: String,
    pub difficulty: i32,
    pub content: Value,
    pub adaptations: Value,
    pub status: String,
    pub is_ai_generated: bool,
    pub generation_metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn subject(&self) -> Subject {
        Subject::parse(&self.subject).unwrap_or(Subject::Other)
    }

    pub fn difficulty(&self) -> DifficultyLevel {
        u8::try_from(self.difficulty)
            .ok()
            .and_then(DifficultyLevel::from_value)
            .unwrap_or_default()
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::parse(&self.status).unwrap_or_default()
    }

    pub fn correct_answer(&self) -> Option<&Value> {
        self.content.get("correct_answer").filter(|v| !v.is_null())
    }

    /// Core record with the given attempts attached.
    pub fn to_record(&self, attempts: Vec<AttemptRecord>) -> TaskRecord {
        TaskRecord {
            id: self.id,
            subject: self.subject(),
            topic: self.topic.clone(),
            difficulty: self.difficulty(),
            status: self.status(),
            iep_goal_id: self.iep_goal_id,
            attempts,
        }
    }
}

#[derive(Debug, Default)]
pub struct TaskFilter {
    pub student_id: Option<i64>,
    pub subject: Option<Subject>,
    pub status: Option<TaskStatus>,
    pub iep_goal_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub template_id: Option<i64>,
    pub student_id: i64,
    pub iep_goal_id: Option<i64>,
    pub subject: Subject,
    pub topic: String,
    pub difficulty: DifficultyLevel,
    pub content: Value,
    pub adaptations: Value,
    pub status: TaskStatus,
    pub is_ai_generated: bool,
    pub generation_metadata: Value,
}

#[derive(Debug, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub iep_goal_id: Option<i64>,
    pub subject: Option<Subject>,
    pub topic: Option<String>,
    pub difficulty: Option<DifficultyLevel>,
    pub content: Option<Value>,
    pub adaptations: Option<Value>,
    pub status: Option<TaskStatus>,
}

pub async fn list_tasks(
    proxy: &DatabaseProxy,
    filter: &TaskFilter,
    skip: i64,
    limit: i64,
) -> Result<Vec<TaskRow>, sqlx::Error> {
    sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT * FROM tasks
        WHERE ($1::bigint IS NULL OR student_id = $1)
          AND ($2::text IS NULL OR subject = $2)
          AND ($3::text IS NULL OR status = $3)
          AND ($4::bigint IS NULL OR iep_goal_id = $4)
        ORDER BY created_at DESC, id DESC
        OFFSET $5 LIMIT $6
        "#,
    )
    .bind(filter.student_id)
    .bind(filter.subject.map(|s| s.as_str()))
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.iep_goal_id)
    .bind(skip)
    .bind(limit)
    .fetch_all(proxy.pool())
    .await
}

/// Every task of a student, for analytics.
pub async fn tasks_for_student(proxy: &DatabaseProxy, student_id: i64) -> Result<Vec<TaskRow>, sqlx::Error> {
    sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE student_id = $1 ORDER BY id")
        .bind(student_id)
        .fetch_all(proxy.pool())
        .await
}

pub async fn tasks_for_goal(proxy: &DatabaseProxy, goal_id: i64) -> Result<Vec<TaskRow>, sqlx::Error> {
    sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE iep_goal_id = $1 ORDER BY id")
        .bind(goal_id)
        .fetch_all(proxy.pool())
        .await
}

pub async fn find_task(proxy: &DatabaseProxy, id: i64) -> Result<Option<TaskRow>, sqlx::Error> {
    sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(proxy.pool())
        .await
}

pub async fn insert_task(proxy: &DatabaseProxy, task: &NewTask) -> Result<TaskRow, sqlx::Error> {
    sqlx::query_as::<_, TaskRow>(
        r#"
        INSERT INTO tasks (
            title, template_id, student_id, iep_goal_id, subject, topic, difficulty,
            content, adaptations, status, is_ai_generated, generation_metadata
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(&task.title)
    .bind(task.template_id)
    .bind(task.student_id)
    .bind(task.iep_goal_id)
    .bind(task.subject.as_str())
    .bind(&task.topic)
    .bind(i32::from(task.difficulty.value()))
    .bind(&task.content)
    .bind(&task.adaptations)
    .bind(task.status.as_str())
    .bind(task.is_ai_generated)
    .bind(&task.generation_metadata)
    .fetch_one(proxy.pool())
    .await
}

pub async fn update_task(
    proxy: &DatabaseProxy,
    id: i64,
    changes: &TaskChanges,
) -> Result<Option<TaskRow>, sqlx::Error> {
    sqlx::query_as::<_, TaskRow>(
        r#"
        UPDATE tasks SET
            title = COALESCE($2, title),
            iep_goal_id = COALESCE($3, iep_goal_id),
            subject = COALESCE($4, subject),
            topic = COALESCE($5, topic),
            difficulty = COALESCE($6, difficulty),
            content = COALESCE($7, content),
            adaptations = COALESCE($8, adaptations),
            status = COALESCE($9, status),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(changes.title.as_deref())
    .bind(changes.iep_goal_id)
    .bind(changes.subject.map(|s| s.as_str()))
    .bind(changes.topic.as_deref())
    .bind(changes.difficulty.map(|d| i32::from(d.value())))
    .bind(changes.content.as_ref())
    .bind(changes.adaptations.as_ref())
    .bind(changes.status.map(|s| s.as_str()))
    .fetch_optional(proxy.pool())
    .await
}

pub async fn set_status(
    proxy: &DatabaseProxy,
    id: i64,
    status: TaskStatus,
) -> Result<Option<TaskRow>, sqlx::Error> {
    update_task(
        proxy,
        id,
        &TaskChanges {
            status: Some(status),
            ..TaskChanges::default()
        },
    )
    .await
}

pub async fn delete_task(proxy: &DatabaseProxy, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(proxy.pool())
        .await?;
    Ok(result.rows_affected() > 0)
}
