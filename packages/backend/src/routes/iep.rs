use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use adaptive_algo::{GoalStatus, IepStatus};

use crate::auth::{AuthUser, ADMIN_ONLY, MANAGERS, STAFF};
use crate::db::operations::iep::{self, GoalChanges, GoalResponse, IepChanges, NewGoal, NewIep};
use crate::db::operations::students;
use crate::response::{ok, AppError};
use crate::services::access::viewable_student;
use crate::state::AppState;

use super::{optional_text, parse_subject, require_text, Pagination};

const TITLE_MAX_LEN: usize = 255;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_ieps).post(create))
        .route("/student/:student_id", get(student_ieps))
        .route("/:id", get(get_iep).put(update).delete(delete))
        .route("/:id/goals", post(add_goal))
        .route("/:id/goals/:goal_id", put(update_goal).delete(delete_goal))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    skip: Option<i64>,
    limit: Option<i64>,
    student_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GoalRequest {
    subject: String,
    title: String,
    description: Option<String>,
    target_metric: Option<String>,
    target_value: Option<f64>,
    #[serde(default)]
    order: i32,
}

impl GoalRequest {
    fn into_new_goal(self) -> Result<NewGoal, AppError> {
        let subject = parse_subject(&self.subject)?;
        require_text("title", &self.title, TITLE_MAX_LEN)?;
        optional_text("target_metric", self.target_metric.as_deref(), 100)?;
        validate_target(self.target_value)?;
        Ok(NewGoal {
            subject: subject.as_str().to_string(),
            title: self.title.trim().to_string(),
            description: self.description,
            target_metric: self.target_metric,
            target_value: self.target_value,
            order: self.order,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreateIepRequest {
    student_id: i64,
    title: String,
    description: Option<String>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    #[serde(default)]
    status: IepStatus,
    #[serde(default)]
    extra_data: Option<Value>,
    #[serde(default)]
    goals: Vec<GoalRequest>,
}

#[derive(Debug, Deserialize)]
struct UpdateIepRequest {
    title: Option<String>,
    description: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    status: Option<IepStatus>,
    extra_data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct UpdateGoalRequest {
    subject: Option<String>,
    title: Option<String>,
    description: Option<String>,
    target_metric: Option<String>,
    target_value: Option<f64>,
    current_value: Option<f64>,
    status: Option<GoalStatus>,
    order: Option<i32>,
}

fn validate_target(target: Option<f64>) -> Result<(), AppError> {
    match target {
        Some(value) if !value.is_finite() || value <= 0.0 => {
            Err(AppError::validation("target_value must be positive"))
        }
        _ => Ok(()),
    }
}

fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), AppError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err(AppError::validation("end_date must not precede start_date"))
        }
        _ => Ok(()),
    }
}

/// A student has at most one active IEP; `this_iep` is the one being saved, if it exists.
fn ensure_single_active(
    status: Option<IepStatus>,
    active_iep: Option<i64>,
    this_iep: Option<i64>,
) -> Result<(), AppError> {
    match (status, active_iep) {
        (Some(IepStatus::Active), Some(active)) if Some(active) != this_iep => Err(
            AppError::conflict("Student already has an active IEP"),
        ),
        _ => Ok(()),
    }
}

async fn list_ieps(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(STAFF)?;
    let (skip, limit) = Pagination::new(query.skip, query.limit).resolve()?;
    let proxy = state.require_db()?;
    Ok(ok(iep::list(&proxy, skip, limit, query.student_id).await?))
}

async fn student_ieps(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, student_id).await?;
    Ok(ok(iep::list_by_student(&proxy, student_id).await?))
}

async fn get_iep(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let found = iep::find(&proxy, id)
        .await?
        .ok_or_else(|| AppError::not_found("IEP not found"))?;
    viewable_student(&proxy, &user, found.iep.student_id).await?;
    Ok(ok(found))
}

async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateIepRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(MANAGERS)?;
    require_text("title", &payload.title, TITLE_MAX_LEN)?;
    validate_dates(Some(payload.start_date), payload.end_date)?;
    let goals = payload
        .goals
        .into_iter()
        .map(GoalRequest::into_new_goal)
        .collect::<Result<Vec<_>, _>>()?;
    let proxy = state.require_db()?;

    if students::find(&proxy, payload.student_id).await?.is_none() {
        return Err(AppError::not_found("Student not found"));
    }
    if payload.status == IepStatus::Active {
        let active = iep::active_iep_id(&proxy, payload.student_id).await?;
        ensure_single_active(Some(payload.status), active, None)?;
    }

    let created = iep::insert(
        &proxy,
        &NewIep {
            student_id: payload.student_id,
            created_by_id: user.id,
            title: payload.title.trim(),
            description: payload.description.as_deref(),
            start_date: payload.start_date,
            end_date: payload.end_date,
            status: payload.status,
            extra_data: payload.extra_data.unwrap_or_else(|| Value::Object(Default::default())),
        },
        &goals,
    )
    .await?;

    tracing::info!(
        iep_id = created.iep.id,
        student_id = created.iep.student_id,
        goals = created.goals.len(),
        "IEP created"
    );
    Ok((StatusCode::CREATED, ok(created)))
}

async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateIepRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(MANAGERS)?;
    if let Some(title) = &payload.title {
        require_text("title", title, TITLE_MAX_LEN)?;
    }
    validate_dates(payload.start_date, payload.end_date)?;
    let proxy = state.require_db()?;

    if payload.status == Some(IepStatus::Active) {
        let existing = iep::find(&proxy, id)
            .await?
            .ok_or_else(|| AppError::not_found("IEP not found"))?;
        let active = iep::active_iep_id(&proxy, existing.iep.student_id).await?;
        ensure_single_active(payload.status, active, Some(id))?;
    }

    let changes = IepChanges {
        title: payload.title.map(|t| t.trim().to_string()),
        description: payload.description,
        start_date: payload.start_date,
        end_date: payload.end_date,
        status: payload.status,
        extra_data: payload.extra_data,
    };
    let updated = iep::update(&proxy, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("IEP not found"))?;
    Ok(ok(updated))
}

async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(ADMIN_ONLY)?;
    let proxy = state.require_db()?;

    if !iep::delete(&proxy, id).await? {
        return Err(AppError::not_found("IEP not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn add_goal(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<GoalRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(MANAGERS)?;
    let goal = payload.into_new_goal()?;
    let proxy = state.require_db()?;

    if iep::find(&proxy, id).await?.is_none() {
        return Err(AppError::not_found("IEP not found"));
    }
    let row = iep::insert_goal(&proxy, id, &goal).await?;
    Ok((StatusCode::CREATED, ok(GoalResponse::from(row))))
}

async fn update_goal(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, goal_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateGoalRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(MANAGERS)?;
    let subject = payload.subject.as_deref().map(parse_subject).transpose()?;
    if let Some(title) = &payload.title {
        require_text("title", title, TITLE_MAX_LEN)?;
    }
    validate_target(payload.target_value)?;
    if matches!(payload.current_value, Some(v) if !v.is_finite() || v < 0.0) {
        return Err(AppError::validation("current_value must be non-negative"));
    }
    let proxy = state.require_db()?;

    let changes = GoalChanges {
        subject: subject.map(|s| s.as_str().to_string()),
        title: payload.title.map(|t| t.trim().to_string()),
        description: payload.description,
        target_metric: payload.target_metric,
        target_value: payload.target_value,
        current_value: payload.current_value,
        status: payload.status,
        order: payload.order,
    };
    let row = iep::update_goal(&proxy, id, goal_id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Goal not found"))?;
    Ok(ok(GoalResponse::from(row)))
}

async fn delete_goal(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((id, goal_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(MANAGERS)?;
    let proxy = state.require_db()?;

    if !iep::delete_goal(&proxy, id, goal_id).await? {
        return Err(AppError::not_found("Goal not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(subject: &str, target: Option<f64>) -> GoalRequest {
        GoalRequest {
            subject: subject.into(),
            title: "Read 40 words per minute".into(),
            description: None,
            target_metric: Some("wpm".into()),
            target_value: target,
            order: 0,
        }
    }

    #[test]
    fn test_goal_subject_normalized() {
        let new_goal = goal(" Reading", Some(40.0)).into_new_goal().unwrap();
        assert_eq!(new_goal.subject, "reading");
    }

    #[test]
    fn test_goal_target_must_be_positive() {
        assert!(goal("math", Some(0.0)).into_new_goal().is_err());
        assert!(goal("math", Some(-3.0)).into_new_goal().is_err());
        assert!(goal("math", None).into_new_goal().is_ok());
        assert!(goal("astronomy", Some(10.0)).into_new_goal().is_err());
    }

    #[test]
    fn test_date_order() {
        let start = NaiveDate::from_ymd_opt(2024, 9, 1);
        let end = NaiveDate::from_ymd_opt(2024, 8, 1);
        assert!(validate_dates(start, end).is_err());
        assert!(validate_dates(end, start).is_ok());
        assert!(validate_dates(None, end).is_ok());
    }

    #[test]
    fn test_second_active_iep_rejected() {
        let err = ensure_single_active(Some(IepStatus::Active), Some(4), None).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err = ensure_single_active(Some(IepStatus::Active), Some(4), Some(9)).unwrap_err();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_active_iep_may_be_saved_again() {
        assert!(ensure_single_active(Some(IepStatus::Active), Some(4), Some(4)).is_ok());
        assert!(ensure_single_active(Some(IepStatus::Active), None, None).is_ok());
        assert!(ensure_single_active(Some(IepStatus::Draft), Some(4), None).is_ok());
        assert!(ensure_single_active(None, Some(4), Some(9)).is_ok());
    }
}
