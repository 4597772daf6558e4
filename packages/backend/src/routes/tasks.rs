use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

use adaptive_algo::{DisabilityCategory, TaskStatus};

use crate::auth::{AuthUser, Role, ADMIN_ONLY, STAFF};
use crate::db::operations::attempts::{self, AttemptReview, AttemptRow, Submission};
use crate::db::operations::students;
use crate::db::operations::tasks::{
    self, NewTask, NewTemplate, TaskChanges, TaskFilter, TaskRow, TemplateChanges, TemplateFilter,
};
use crate::db::DatabaseProxy;
use crate::response::{ok, AppError};
use crate::services::access::viewable_student;
use crate::services::generator::{answer_text, answers_match};
use crate::state::AppState;

use super::{optional_text, parse_difficulty, parse_subject, require_text, Pagination};

const AUTHORS: &[Role] = &[Role::Teacher, Role::Admin];
const TASK_EDITORS: &[Role] = &[Role::Teacher, Role::Tutor, Role::Admin];
const TEXT_MAX_LEN: usize = 255;
const MIN_GRADE: i32 = 1;
const MAX_GRADE: i32 = 11;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/:id",
            get(get_template).patch(update_template).delete(delete_template),
        )
        .route("/", get(list_tasks).post(create_task))
        .route("/student/:student_id", get(student_tasks))
        .route("/:id", get(get_task).patch(update_task).delete(delete_task))
        .route("/:id/complete", post(complete_task))
        .route("/:id/archive", post(archive_task))
        .route("/:id/attempts", get(task_attempts).post(start_attempt))
        .route("/attempts/:id", patch(review_attempt))
        .route("/attempts/:id/submit", post(submit_attempt))
        .route("/attempts/:id/hint", post(use_hint))
        .route("/attempts/student/:student_id", get(student_attempts))
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn parse_status(raw: &str) -> Result<TaskStatus, AppError> {
    TaskStatus::parse(raw).ok_or_else(|| AppError::validation(format!("Unknown task status: {raw}")))
}

fn normalize_disabilities(tags: &[String]) -> Result<Vec<String>, AppError> {
    tags.iter()
        .map(|tag| {
            DisabilityCategory::parse(tag)
                .map(|c| c.as_str().to_string())
                .ok_or_else(|| AppError::validation(format!("Unknown disability type: {tag}")))
        })
        .collect()
}

fn validate_grades(min_grade: Option<i32>, max_grade: Option<i32>) -> Result<(), AppError> {
    for grade in [min_grade, max_grade].into_iter().flatten() {
        if !(MIN_GRADE..=MAX_GRADE).contains(&grade) {
            return Err(AppError::validation(format!(
                "grades must be between {MIN_GRADE} and {MAX_GRADE}"
            )));
        }
    }
    if let (Some(min), Some(max)) = (min_grade, max_grade) {
        if min > max {
            return Err(AppError::validation("min_grade must not exceed max_grade"));
        }
    }
    Ok(())
}

fn validate_score(score: Option<f64>) -> Result<(), AppError> {
    match score {
        Some(s) if !(0.0..=100.0).contains(&s) => {
            Err(AppError::validation("score must be between 0 and 100"))
        }
        _ => Ok(()),
    }
}

/// Compare `answers.selected` or `answers.text` against the stored correct answer.
fn derive_correctness(answers: &Value, correct_answer: Option<&Value>) -> Option<bool> {
    let correct = correct_answer?;
    let given = answers.get("selected").or_else(|| answers.get("text"))?;
    if given.is_null() {
        return None;
    }
    Some(answers_match(&answer_text(given), &answer_text(correct)))
}

async fn load_task(state: &AppState, id: i64) -> Result<TaskRow, AppError> {
    let proxy = state.require_db()?;
    tasks::find_task(&proxy, id)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))
}

// ==================== Templates ====================

#[derive(Debug, Deserialize)]
struct TemplateQuery {
    skip: Option<i64>,
    limit: Option<i64>,
    subject: Option<String>,
    grade: Option<i32>,
    disability_type: Option<String>,
    is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CreateTemplateRequest {
    name: String,
    description: Option<String>,
    subject: String,
    topic: String,
    subtopic: Option<String>,
    #[serde(default = "default_difficulty")]
    base_difficulty: i32,
    #[serde(default)]
    disability_types: Vec<String>,
    prompt_template: Option<String>,
    content: Option<Value>,
    #[serde(default = "default_public")]
    is_public: bool,
    #[serde(default = "default_min_grade")]
    min_grade: i32,
    #[serde(default = "default_max_grade")]
    max_grade: i32,
}

fn default_difficulty() -> i32 {
    3
}

fn default_public() -> bool {
    true
}

fn default_min_grade() -> i32 {
    MIN_GRADE
}

fn default_max_grade() -> i32 {
    MAX_GRADE
}

#[derive(Debug, Deserialize)]
struct UpdateTemplateRequest {
    name: Option<String>,
    description: Option<String>,
    subject: Option<String>,
    topic: Option<String>,
    subtopic: Option<String>,
    base_difficulty: Option<i32>,
    disability_types: Option<Vec<String>>,
    prompt_template: Option<String>,
    content: Option<Value>,
    is_public: Option<bool>,
    min_grade: Option<i32>,
    max_grade: Option<i32>,
}

impl CreateTemplateRequest {
    fn into_new(self) -> Result<NewTemplate, AppError> {
        require_text("name", &self.name, TEXT_MAX_LEN)?;
        require_text("topic", &self.topic, TEXT_MAX_LEN)?;
        optional_text("subtopic", self.subtopic.as_deref(), TEXT_MAX_LEN)?;
        validate_grades(Some(self.min_grade), Some(self.max_grade))?;
        Ok(NewTemplate {
            subject: parse_subject(&self.subject)?,
            base_difficulty: parse_difficulty(self.base_difficulty)?,
            disability_types: normalize_disabilities(&self.disability_types)?,
            name: self.name.trim().to_string(),
            description: self.description,
            topic: self.topic.trim().to_string(),
            subtopic: self.subtopic,
            prompt_template: self.prompt_template,
            content: self.content.unwrap_or_else(empty_object),
            is_public: self.is_public,
            min_grade: self.min_grade,
            max_grade: self.max_grade,
        })
    }
}

impl UpdateTemplateRequest {
    fn into_changes(self) -> Result<TemplateChanges, AppError> {
        if let Some(name) = &self.name {
            require_text("name", name, TEXT_MAX_LEN)?;
        }
        if let Some(topic) = &self.topic {
            require_text("topic", topic, TEXT_MAX_LEN)?;
        }
        optional_text("subtopic", self.subtopic.as_deref(), TEXT_MAX_LEN)?;
        validate_grades(self.min_grade, self.max_grade)?;
        Ok(TemplateChanges {
            subject: self.subject.as_deref().map(parse_subject).transpose()?,
            base_difficulty: self.base_difficulty.map(parse_difficulty).transpose()?,
            disability_types: self
                .disability_types
                .as_deref()
                .map(normalize_disabilities)
                .transpose()?,
            name: self.name.map(|n| n.trim().to_string()),
            description: self.description,
            topic: self.topic.map(|t| t.trim().to_string()),
            subtopic: self.subtopic,
            prompt_template: self.prompt_template,
            content: self.content,
            is_public: self.is_public,
            min_grade: self.min_grade,
            max_grade: self.max_grade,
        })
    }
}

async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (skip, limit) = Pagination::new(query.skip, query.limit).resolve()?;
    let filter = TemplateFilter {
        subject: query.subject.as_deref().map(parse_subject).transpose()?,
        grade: query.grade,
        disability_type: query
            .disability_type
            .as_deref()
            .map(|tag| normalize_disabilities(&[tag.to_string()]))
            .transpose()?
            .and_then(|mut tags| tags.pop()),
        is_public: query.is_public,
    };
    let proxy = state.require_db()?;
    Ok(ok(tasks::list_templates(&proxy, &filter, skip, limit).await?))
}

async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let template = tasks::find_template(&proxy, id)
        .await?
        .ok_or_else(|| AppError::not_found("Task template not found"))?;
    Ok(ok(template))
}

async fn create_template(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateTemplateRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(AUTHORS)?;
    let template = payload.into_new()?;
    let proxy = state.require_db()?;

    let row = tasks::insert_template(&proxy, &template, user.id).await?;
    Ok((StatusCode::CREATED, ok(row)))
}

async fn update_template(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTemplateRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(AUTHORS)?;
    let changes = payload.into_changes()?;
    let proxy = state.require_db()?;

    let row = tasks::update_template(&proxy, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Task template not found"))?;
    Ok(ok(row))
}

async fn delete_template(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(ADMIN_ONLY)?;
    let proxy = state.require_db()?;

    if !tasks::delete_template(&proxy, id).await? {
        return Err(AppError::not_found("Task template not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Tasks ====================

#[derive(Debug, Deserialize)]
struct TaskQuery {
    skip: Option<i64>,
    limit: Option<i64>,
    student_id: Option<i64>,
    subject: Option<String>,
    status: Option<String>,
    iep_goal_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    title: String,
    student_id: i64,
    template_id: Option<i64>,
    iep_goal_id: Option<i64>,
    subject: String,
    topic: String,
    #[serde(default = "default_difficulty")]
    difficulty: i32,
    content: Option<Value>,
    adaptations: Option<Value>,
    status: Option<String>,
    #[serde(default)]
    is_ai_generated: bool,
    generation_metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UpdateTaskRequest {
    title: Option<String>,
    iep_goal_id: Option<i64>,
    subject: Option<String>,
    topic: Option<String>,
    difficulty: Option<i32>,
    content: Option<Value>,
    adaptations: Option<Value>,
    status: Option<String>,
}

impl CreateTaskRequest {
    fn into_new(self) -> Result<NewTask, AppError> {
        require_text("title", &self.title, TEXT_MAX_LEN)?;
        require_text("topic", &self.topic, TEXT_MAX_LEN)?;
        Ok(NewTask {
            subject: parse_subject(&self.subject)?,
            difficulty: parse_difficulty(self.difficulty)?,
            status: self.status.as_deref().map(parse_status).transpose()?.unwrap_or_default(),
            title: self.title.trim().to_string(),
            template_id: self.template_id,
            student_id: self.student_id,
            iep_goal_id: self.iep_goal_id,
            topic: self.topic.trim().to_string(),
            content: self.content.unwrap_or_else(empty_object),
            adaptations: self.adaptations.unwrap_or_else(empty_object),
            is_ai_generated: self.is_ai_generated,
            generation_metadata: self.generation_metadata.unwrap_or_else(empty_object),
        })
    }
}

impl UpdateTaskRequest {
    fn into_changes(self) -> Result<TaskChanges, AppError> {
        if let Some(title) = &self.title {
            require_text("title", title, TEXT_MAX_LEN)?;
        }
        if let Some(topic) = &self.topic {
            require_text("topic", topic, TEXT_MAX_LEN)?;
        }
        Ok(TaskChanges {
            subject: self.subject.as_deref().map(parse_subject).transpose()?,
            difficulty: self.difficulty.map(parse_difficulty).transpose()?,
            status: self.status.as_deref().map(parse_status).transpose()?,
            title: self.title.map(|t| t.trim().to_string()),
            iep_goal_id: self.iep_goal_id,
            topic: self.topic.map(|t| t.trim().to_string()),
            content: self.content,
            adaptations: self.adaptations,
        })
    }
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (skip, limit) = Pagination::new(query.skip, query.limit).resolve()?;
    let filter = TaskFilter {
        student_id: query.student_id,
        subject: query.subject.as_deref().map(parse_subject).transpose()?,
        status: query.status.as_deref().map(parse_status).transpose()?,
        iep_goal_id: query.iep_goal_id,
    };
    let proxy = state.require_db()?;
    Ok(ok(tasks::list_tasks(&proxy, &filter, skip, limit).await?))
}

async fn student_tasks(
    State(state): State<AppState>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    Ok(ok(tasks::tasks_for_student(&proxy, student_id).await?))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(load_task(&state, id).await?))
}

async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(TASK_EDITORS)?;
    let task = payload.into_new()?;
    let proxy = state.require_db()?;

    if students::find(&proxy, task.student_id).await?.is_none() {
        return Err(AppError::not_found("Student not found"));
    }
    let row = tasks::insert_task(&proxy, &task).await?;
    tracing::info!(task_id = row.id, student_id = row.student_id, "task created");
    Ok((StatusCode::CREATED, ok(row)))
}

async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(TASK_EDITORS)?;
    let changes = payload.into_changes()?;
    let proxy = state.require_db()?;

    let row = tasks::update_task(&proxy, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))?;
    Ok(ok(row))
}

async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(AUTHORS)?;
    let proxy = state.require_db()?;

    if !tasks::delete_task(&proxy, id).await? {
        return Err(AppError::not_found("Task not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn transition(
    state: AppState,
    user: AuthUser,
    id: i64,
    status: TaskStatus,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(STAFF)?;
    let proxy = state.require_db()?;

    let row = tasks::set_status(&proxy, id, status)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))?;
    tracing::info!(task_id = id, status = status.as_str(), "task status changed");
    Ok(ok(row))
}

async fn complete_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    transition(state, user, id, TaskStatus::Completed).await
}

async fn archive_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    transition(state, user, id, TaskStatus::Archived).await
}

// ==================== Attempts ====================

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    #[serde(default = "empty_object")]
    answers: Value,
    time_spent: Option<i32>,
    is_correct: Option<bool>,
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    score: Option<f64>,
    is_correct: Option<bool>,
    feedback: Option<Value>,
}

async fn task_attempts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let task = load_task(&state, id).await?;
    let proxy = state.require_db()?;
    Ok(ok(attempts::list_for_task(&proxy, task.id).await?))
}

async fn start_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let task = load_task(&state, id).await?;
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, task.student_id).await?;

    let scaffolding = students::find_profile(&proxy, task.student_id)
        .await?
        .map(|profile| profile.scaffolding_level);
    let row = attempts::insert(&proxy, task.id, task.student_id, scaffolding).await?;
    Ok((StatusCode::CREATED, ok(row)))
}

/// Attempt whose student the caller may read; checked before any state is revealed.
async fn accessible_attempt(
    proxy: &DatabaseProxy,
    user: &AuthUser,
    id: i64,
) -> Result<AttemptRow, AppError> {
    let attempt = attempts::find(proxy, id)
        .await?
        .ok_or_else(|| AppError::not_found("Attempt not found"))?;
    viewable_student(proxy, user, attempt.student_id).await?;
    Ok(attempt)
}

fn ensure_open(attempt: &AttemptRow) -> Result<(), AppError> {
    if attempt.is_completed() {
        return Err(AppError::conflict("Attempt already submitted"));
    }
    Ok(())
}

async fn submit_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_score(payload.score)?;
    if matches!(payload.time_spent, Some(t) if t < 0) {
        return Err(AppError::validation("time_spent must be non-negative"));
    }
    let proxy = state.require_db()?;

    let attempt = accessible_attempt(&proxy, &user, id).await?;
    ensure_open(&attempt)?;
    let task = load_task(&state, attempt.task_id).await?;

    let is_correct = payload
        .is_correct
        .or_else(|| derive_correctness(&payload.answers, task.correct_answer()));
    let time_spent = payload.time_spent.and_then(|t| u32::try_from(t).ok());

    let now = Utc::now();
    let submitted = attempt
        .to_record()
        .submit(now, payload.score, is_correct, time_spent)?;

    let row = attempts::record_submission(
        &proxy,
        id,
        &Submission {
            completed_at: submitted.completed_at.unwrap_or(now),
            score: submitted.score,
            is_correct: submitted.is_correct,
            time_spent: submitted.time_spent.map(|t| i32::try_from(t).unwrap_or(i32::MAX)),
            answers: &payload.answers,
        },
    )
    .await?
    .ok_or_else(|| AppError::conflict("Attempt already submitted"))?;

    tracing::info!(
        attempt_id = row.id,
        task_id = row.task_id,
        score = ?row.score,
        is_correct = ?row.is_correct,
        "attempt submitted"
    );
    Ok(ok(row))
}

async fn use_hint(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    accessible_attempt(&proxy, &user, id).await?;

    let row = attempts::increment_hints(&proxy, id)
        .await?
        .ok_or_else(|| AppError::conflict("Attempt already submitted"))?;
    Ok(ok(row))
}

async fn review_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(TASK_EDITORS)?;
    validate_score(payload.score)?;
    let proxy = state.require_db()?;

    let review = AttemptReview {
        score: payload.score,
        is_correct: payload.is_correct,
        feedback: payload.feedback,
    };
    let row = attempts::review(&proxy, id, &review)
        .await?
        .ok_or_else(|| AppError::not_found("Attempt not found"))?;
    Ok(ok(row))
}

async fn student_attempts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<i64>,
    Query(page): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let (skip, limit) = page.resolve()?;
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, student_id).await?;
    Ok(ok(attempts::list_for_student(&proxy, student_id, skip, limit).await?))
}
