use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use adaptive_algo::{DisabilityCategory, LearningStyle};

use crate::auth::{AuthUser, Role, ADMIN_ONLY, MANAGERS, STAFF};
use crate::db::operations::students::{self, NewStudent, ProfileChanges, StudentChanges};
use crate::response::{ok, AppError};
use crate::services::access::viewable_student;
use crate::services::records::student_context;
use crate::state::AppState;

use super::{optional_text, require_text, Pagination};

const MIN_GRADE: i32 = 1;
const MAX_GRADE: i32 = 11;
const NAME_MAX_LEN: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_students).post(create))
        .route("/my-children", get(my_children))
        .route("/:id", get(get_student).put(update).delete(delete))
        .route("/:id/profile", get(get_profile).put(update_profile))
        .route("/:id/adaptations", get(adaptations))
}

#[derive(Debug, Deserialize)]
struct CreateStudentRequest {
    first_name: String,
    last_name: String,
    middle_name: Option<String>,
    birth_date: Option<NaiveDate>,
    grade: i32,
    user_id: Option<i64>,
    parent_id: Option<i64>,
    profile: Option<ProfileRequest>,
}

#[derive(Debug, Deserialize)]
struct UpdateStudentRequest {
    first_name: Option<String>,
    last_name: Option<String>,
    middle_name: Option<String>,
    birth_date: Option<NaiveDate>,
    grade: Option<i32>,
    parent_id: Option<i64>,
}

/// Partial profile; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize)]
struct ProfileRequest {
    disability_types: Option<Vec<String>>,
    learning_style: Option<String>,
    scaffolding_level: Option<i32>,
    current_difficulty: Option<i32>,
    font_size: Option<i32>,
    line_height: Option<f64>,
    color_scheme: Option<String>,
    audio_enabled: Option<bool>,
    animations_enabled: Option<bool>,
    preferred_pace: Option<i32>,
    interests: Option<Value>,
    settings: Option<Value>,
}

fn validate_grade(grade: i32) -> Result<(), AppError> {
    if (MIN_GRADE..=MAX_GRADE).contains(&grade) {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "grade must be between {MIN_GRADE} and {MAX_GRADE}"
        )))
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    field: &str,
    value: Option<T>,
    min: T,
    max: T,
) -> Result<(), AppError> {
    match value {
        Some(v) if v < min || v > max => Err(AppError::validation(format!(
            "{field} must be between {min} and {max}"
        ))),
        _ => Ok(()),
    }
}

impl ProfileRequest {
    fn into_changes(self) -> Result<ProfileChanges, AppError> {
        check_range("font_size", self.font_size, 12, 32)?;
        check_range("line_height", self.line_height, 1.0, 3.0)?;
        check_range("scaffolding_level", self.scaffolding_level, 1, 5)?;
        check_range("current_difficulty", self.current_difficulty, 1, 5)?;
        if matches!(self.preferred_pace, Some(pace) if pace <= 0) {
            return Err(AppError::validation("preferred_pace must be positive"));
        }
        optional_text("color_scheme", self.color_scheme.as_deref(), 50)?;

        let learning_style = match self.learning_style.as_deref() {
            Some(raw) => Some(
                LearningStyle::parse(raw)
                    .ok_or_else(|| AppError::validation(format!("Unknown learning style: {raw}")))?
                    .as_str()
                    .to_string(),
            ),
            None => None,
        };

        let disability_types = match self.disability_types {
            Some(tags) => Some(
                tags.iter()
                    .map(|tag| {
                        DisabilityCategory::parse(tag)
                            .map(|c| c.as_str().to_string())
                            .ok_or_else(|| AppError::validation(format!("Unknown disability type: {tag}")))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        Ok(ProfileChanges {
            disability_types,
            learning_style,
            scaffolding_level: self.scaffolding_level,
            current_difficulty: self.current_difficulty,
            font_size: self.font_size,
            line_height: self.line_height,
            color_scheme: self.color_scheme,
            audio_enabled: self.audio_enabled,
            animations_enabled: self.animations_enabled,
            preferred_pace: self.preferred_pace,
            interests: self.interests,
            settings: self.settings,
        })
    }
}

async fn list_students(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(page): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(STAFF)?;
    let (skip, limit) = page.resolve()?;
    let proxy = state.require_db()?;
    Ok(ok(students::list(&proxy, skip, limit).await?))
}

async fn my_children(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    if user.role != Role::Parent {
        return Err(AppError::forbidden("Available to parents only"));
    }
    let proxy = state.require_db()?;

    let mut children = Vec::new();
    for student in students::list_by_parent(&proxy, user.id).await? {
        let profile = students::find_profile(&proxy, student.id).await?;
        children.push(students::StudentWithProfile { student, profile });
    }
    Ok(ok(children))
}

async fn get_student(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    let student = viewable_student(&proxy, &user, id).await?;
    let profile = students::find_profile(&proxy, id).await?;
    Ok(ok(students::StudentWithProfile { student, profile }))
}

async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(MANAGERS)?;
    require_text("first_name", &payload.first_name, NAME_MAX_LEN)?;
    require_text("last_name", &payload.last_name, NAME_MAX_LEN)?;
    optional_text("middle_name", payload.middle_name.as_deref(), NAME_MAX_LEN)?;
    validate_grade(payload.grade)?;
    let profile_changes = payload.profile.map(ProfileRequest::into_changes).transpose()?;
    let proxy = state.require_db()?;

    let mut created = students::insert(
        &proxy,
        &NewStudent {
            user_id: payload.user_id,
            parent_id: payload.parent_id,
            first_name: payload.first_name.trim(),
            last_name: payload.last_name.trim(),
            middle_name: payload.middle_name.as_deref().map(str::trim),
            birth_date: payload.birth_date,
            grade: payload.grade,
        },
    )
    .await?;

    if let Some(changes) = profile_changes {
        created.profile = students::update_profile(&proxy, created.student.id, &changes).await?;
    }

    tracing::info!(student_id = created.student.id, created_by = user.id, "student created");
    Ok((StatusCode::CREATED, ok(created)))
}

async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(MANAGERS)?;
    if let Some(first_name) = &payload.first_name {
        require_text("first_name", first_name, NAME_MAX_LEN)?;
    }
    if let Some(last_name) = &payload.last_name {
        require_text("last_name", last_name, NAME_MAX_LEN)?;
    }
    optional_text("middle_name", payload.middle_name.as_deref(), NAME_MAX_LEN)?;
    if let Some(grade) = payload.grade {
        validate_grade(grade)?;
    }
    let proxy = state.require_db()?;

    let changes = StudentChanges {
        parent_id: payload.parent_id,
        first_name: payload.first_name.map(|n| n.trim().to_string()),
        last_name: payload.last_name.map(|n| n.trim().to_string()),
        middle_name: payload.middle_name,
        birth_date: payload.birth_date,
        grade: payload.grade,
    };
    let student = students::update(&proxy, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Student not found"))?;
    let profile = students::find_profile(&proxy, id).await?;
    Ok(ok(students::StudentWithProfile { student, profile }))
}

async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    user.require_role(ADMIN_ONLY)?;
    let proxy = state.require_db()?;

    if !students::delete(&proxy, id).await? {
        return Err(AppError::not_found("Student not found"));
    }
    tracing::info!(student_id = id, deleted_by = user.id, "student deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, id).await?;

    let profile = students::find_profile(&proxy, id)
        .await?
        .ok_or_else(|| AppError::not_found("Student profile not found"))?;
    Ok(ok(profile))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<ProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    if user.role == Role::Student {
        return Err(AppError::forbidden("Students cannot change adaptation profiles"));
    }
    let changes = payload.into_changes()?;
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, id).await?;

    let profile = students::update_profile(&proxy, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Student profile not found"))?;
    Ok(ok(profile))
}

async fn adaptations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let proxy = state.require_db()?;
    viewable_student(&proxy, &user, id).await?;

    let context = student_context(&proxy, id).await?;
    Ok(ok(context.adaptation_plan()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_ranges() {
        let bad_font = ProfileRequest {
            font_size: Some(40),
            ..ProfileRequest::default()
        };
        assert!(bad_font.into_changes().is_err());

        let bad_line = ProfileRequest {
            line_height: Some(0.5),
            ..ProfileRequest::default()
        };
        assert!(bad_line.into_changes().is_err());

        let bad_scaffolding = ProfileRequest {
            scaffolding_level: Some(6),
            ..ProfileRequest::default()
        };
        assert!(bad_scaffolding.into_changes().is_err());
    }

    #[test]
    fn test_profile_tags_normalized() {
        let request = ProfileRequest {
            disability_types: Some(vec![" Dyslexia".into(), "ADHD".into()]),
            learning_style: Some("Auditory".into()),
            font_size: Some(18),
            ..ProfileRequest::default()
        };
        let changes = request.into_changes().unwrap();
        assert_eq!(
            changes.disability_types,
            Some(vec!["dyslexia".to_string(), "adhd".to_string()])
        );
        assert_eq!(changes.learning_style.as_deref(), Some("auditory"));
        assert_eq!(changes.font_size, Some(18));
    }

    #[test]
    fn test_unknown_tags_rejected() {
        let request = ProfileRequest {
            disability_types: Some(vec!["unknown".into()]),
            ..ProfileRequest::default()
        };
        assert!(request.into_changes().is_err());

        let style = ProfileRequest {
            learning_style: Some("telepathic".into()),
            ..ProfileRequest::default()
        };
        assert!(style.into_changes().is_err());
    }

    #[test]
    fn test_grade_bounds() {
        assert!(validate_grade(0).is_err());
        assert!(validate_grade(1).is_ok());
        assert!(validate_grade(11).is_ok());
        assert!(validate_grade(12).is_err());
    }
}
