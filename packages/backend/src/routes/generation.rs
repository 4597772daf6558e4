use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use adaptive_algo::ScaffoldingLevel;

use crate::auth::{AuthUser, Role, STAFF};
use crate::db::operations::attempts;
use crate::db::operations::tasks::{self, NewTask};
use crate::response::{ok, AppError};
use crate::services::access::{attempts_of_student, ensure_task_of_student, viewable_student};
use crate::services::generator::{
    adapt_existing_task, answer_text, FeedbackRequest, GeneratedTask, TaskInfo,
};
use crate::services::records::student_context;
use crate::state::AppState;

use super::{parse_difficulty, parse_subject, require_text};

const GENERATORS: &[Role] = &[Role::Teacher, Role::Tutor, Role::Admin];
const TOPIC_MAX_LEN: usize = 255;
const ANSWER_MAX_LEN: usize = 5000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/task", post(generate_task))
        .route("/task/save", post(generate_and_save))
        .route("/adapt", post(adapt_task))
        .route("/explain", post(explain))
        .route("/feedback", post(feedback))
}

#[derive(Debug, Deserialize)]
struct GenerateTaskRequest {
    student_id: i64,
    subject: String,
    topic: String,
    difficulty: Option<i32>,
    iep_goal_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AdaptRequest {
    task_id: i64,
    disability_types: Option<Vec<String>>,
    scaffolding_level: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ExplainRequest {
    student_id: i64,
    task_id: i64,
}

#[derive(Debug, Deserialize)]
struct FeedbackBody {
    task_id: i64,
    student_answer: String,
    #[serde(default)]
    hints_used: i32,
    time_spent: Option<i32>,
}

async fn run_generation(
    state: &AppState,
    user: &AuthUser,
    payload: &GenerateTaskRequest,
) -> Result<GeneratedTask, AppError> {
    user.require_role(GENERATORS)?;
    require_text("topic", &payload.topic, TOPIC_MAX_LEN)?;
    let subject = parse_subject(&payload.subject)?;
    let difficulty = payload.difficulty.map(parse_difficulty).transpose()?;
    let proxy = state.require_db()?;

    let context = student_context(&proxy, payload.student_id).await?;
    let generated = state
        .generator()
        .generate_task(&context, subject, payload.topic.trim(), difficulty)
        .await?;

    tracing::info!(
        student_id = payload.student_id,
        subject = subject.as_str(),
        generated_by = user.id,
        "task generated"
    );
    Ok(generated)
}

async fn generate_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<GenerateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let generated = run_generation(&state, &user, &payload).await?;
    Ok(ok(generated))
}

async fn generate_and_save(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<GenerateTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let generated = run_generation(&state, &user, &payload).await?;
    let proxy = state.require_db()?;

    let to_json = |value: Result<Value, serde_json::Error>| {
        value.map_err(|err| AppError::internal(format!("task serialization failed: {err}")))
    };
    let task = NewTask {
        title: generated.title.clone(),
        template_id: None,
        student_id: payload.student_id,
        iep_goal_id: payload.iep_goal_id,
        subject: generated.subject,
        topic: generated.topic.clone(),
        difficulty: generated.difficulty,
        content: to_json(serde_json::to_value(&generated.content))?,
        adaptations: to_json(serde_json::to_value(&generated.adaptations))?,
        status: Default::default(),
        is_ai_generated: true,
        generation_metadata: generated.generation_metadata.clone(),
    };
    let row = tasks::insert_task(&proxy, &task).await?;

    Ok((
        StatusCode::CREATED,
        ok(json!({ "task_id": row.id, "generated": generated })),
    ))
}

async fn adapt_task(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AdaptRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(STAFF)?;
    let scaffolding = payload
        .scaffolding_level
        .map(|level| {
            u8::try_from(level)
                .ok()
                .and_then(ScaffoldingLevel::from_value)
                .ok_or_else(|| AppError::validation("scaffolding_level must be between 1 and 5"))
        })
        .transpose()?;
    let proxy = state.require_db()?;

    let task = tasks::find_task(&proxy, payload.task_id)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))?;
    let mut context = student_context(&proxy, task.student_id).await?;
    if let Some(disabilities) = payload.disability_types {
        context.disabilities = disabilities;
    }
    if scaffolding.is_some() {
        context.scaffolding = scaffolding;
    }

    Ok(ok(adapt_existing_task(task.id, &context)))
}

async fn explain(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ExplainRequest>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, payload.student_id).await?;

    let task = tasks::find_task(&proxy, payload.task_id)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))?;
    ensure_task_of_student(&task, payload.student_id)?;
    let context = student_context(&proxy, payload.student_id).await?;

    let rows = attempts::list_for_task(&proxy, task.id).await?;
    let history = attempts_of_student(&rows, payload.student_id);
    let info = TaskInfo {
        title: task.title.clone(),
        subject: task.subject(),
        topic: task.topic.clone(),
        difficulty: task.difficulty(),
    };

    let explanation = state
        .generator()
        .explain_recommendation(&context, &info, &json!(history))
        .await?;
    Ok(ok(explanation))
}

async fn feedback(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<FeedbackBody>,
) -> Result<impl IntoResponse, AppError> {
    if payload.student_answer.chars().count() > ANSWER_MAX_LEN {
        return Err(AppError::validation(format!(
            "student_answer must be at most {ANSWER_MAX_LEN} characters"
        )));
    }
    if payload.hints_used < 0 || matches!(payload.time_spent, Some(t) if t < 0) {
        return Err(AppError::validation("hints_used and time_spent must be non-negative"));
    }
    let proxy = state.require_db()?;

    let task = tasks::find_task(&proxy, payload.task_id)
        .await?
        .ok_or_else(|| AppError::not_found("Task not found"))?;
    viewable_student(&proxy, &user, task.student_id).await?;
    let context = student_context(&proxy, task.student_id).await?;

    let correct_answer = task.correct_answer().map(answer_text).unwrap_or_default();
    let request = FeedbackRequest {
        task_title: &task.title,
        correct_answer: &correct_answer,
        student_answer: &payload.student_answer,
        hints_used: payload.hints_used,
        time_spent: payload.time_spent,
    };

    let feedback = state.generator().generate_feedback(&context, &request).await?;
    Ok(ok(feedback))
}
