use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use chrono::{NaiveDate, Utc};
use futures::future::try_join_all;
use serde::Deserialize;

use adaptive_algo::progress::week_start_for;
use adaptive_algo::recommend::{validate_limit, DEFAULT_RECOMMENDATION_LIMIT};
use adaptive_algo::{
    goal_progress, iep_progress, recommend_tasks, student_analytics, subject_progress, summarize,
    summarize_many, weekly_report,
};

use crate::auth::{AuthUser, STAFF};
use crate::db::operations::iep;
use crate::response::{ok, AppError};
use crate::services::access::viewable_student;
use crate::services::records::{goal_task_records, iep_records, task_records, week_attempts};
use crate::state::AppState;

use super::parse_subject;

const MAX_BATCH_STUDENTS: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summary/:student_id", get(summary))
        .route("/summaries", get(summaries))
        .route("/subject/:student_id/:subject", get(subject))
        .route("/iep/:student_id", get(iep_overview))
        .route("/goal/:goal_id", get(goal))
        .route("/weekly/:student_id", get(weekly))
        .route("/analytics/:student_id", get(analytics))
        .route("/recommendations/:student_id", get(recommendations))
}

#[derive(Debug, Deserialize)]
struct SummariesQuery {
    student_ids: String,
}

#[derive(Debug, Deserialize)]
struct WeeklyQuery {
    week_start: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct RecommendationQuery {
    subject: Option<String>,
    limit: Option<usize>,
}

fn parse_student_ids(raw: &str) -> Result<Vec<i64>, AppError> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = part
            .parse::<i64>()
            .map_err(|_| AppError::validation(format!("Invalid student id: {part}")))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(AppError::validation("student_ids must list at least one id"));
    }
    if ids.len() > MAX_BATCH_STUDENTS {
        return Err(AppError::validation(format!(
            "at most {MAX_BATCH_STUDENTS} students per request"
        )));
    }
    Ok(ids)
}

async fn summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, student_id).await?;

    let tasks = task_records(&proxy, student_id).await?;
    Ok(ok(summarize(student_id, &tasks)))
}

async fn summaries(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SummariesQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(STAFF)?;
    let ids = parse_student_ids(&query.student_ids)?;
    let proxy = state.require_db()?;

    let histories = try_join_all(ids.iter().map(|&id| {
        let proxy = proxy.clone();
        async move { task_records(&proxy, id).await.map(|tasks| (id, tasks)) }
    }))
    .await?;

    Ok(ok(summarize_many(&histories)))
}

async fn subject(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((student_id, subject)): Path<(i64, String)>,
) -> Result<impl IntoResponse, AppError> {
    let subject = parse_subject(&subject)?;
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, student_id).await?;

    let tasks = task_records(&proxy, student_id).await?;
    Ok(ok(subject_progress(subject, &tasks)))
}

async fn iep_overview(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, student_id).await?;

    let ieps = iep_records(&proxy, student_id).await?;
    Ok(ok(iep_progress(student_id, &ieps)))
}

async fn goal(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(goal_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let goal = iep::find_goal(&proxy, goal_id)
        .await?
        .ok_or_else(|| AppError::not_found("Goal not found"))?;
    let plan = iep::find(&proxy, goal.iep_id)
        .await?
        .ok_or_else(|| AppError::not_found("IEP not found"))?;
    viewable_student(&proxy, &user, plan.iep.student_id).await?;

    let tasks = goal_task_records(&proxy, goal_id).await?;
    Ok(ok(goal_progress(goal_id, &[goal.to_record()], &tasks)?))
}

async fn weekly(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<i64>,
    Query(query): Query<WeeklyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let today = Utc::now().date_naive();
    let week_start = query.week_start.unwrap_or_else(|| week_start_for(today));
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, student_id).await?;

    let attempts = week_attempts(&proxy, student_id, week_start).await?;
    Ok(ok(weekly_report(student_id, Some(week_start), today, &attempts)))
}

async fn analytics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, student_id).await?;

    let tasks = task_records(&proxy, student_id).await?;
    let ieps = iep_records(&proxy, student_id).await?;
    Ok(ok(student_analytics(student_id, &tasks, &ieps)))
}

async fn recommendations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<i64>,
    Query(query): Query<RecommendationQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = validate_limit(query.limit.unwrap_or(DEFAULT_RECOMMENDATION_LIMIT))?;
    let subject = query.subject.as_deref().map(parse_subject).transpose()?;
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, student_id).await?;

    let tasks = task_records(&proxy, student_id).await?;
    Ok(ok(recommend_tasks(&tasks, subject, limit)?))
}
