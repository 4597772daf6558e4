use adaptive_algo::AttemptRecord;

use crate::auth::{AuthUser, Role};
use crate::db::operations::attempts::AttemptRow;
use crate::db::operations::students::{self, StudentRow};
use crate::db::operations::tasks::TaskRow;
use crate::db::DatabaseProxy;
use crate::response::AppError;

/// Whether `user` may read data about `student`.
///
/// Staff see everyone, a parent sees their own children and a student sees
/// only their own record.
pub fn can_view_student(user: &AuthUser, student: &StudentRow) -> bool {
    match user.role {
        Role::Admin | Role::Teacher | Role::Tutor => true,
        Role::Parent => student.parent_id == Some(user.id),
        Role::Student => student.user_id == Some(user.id),
    }
}

/// Load a student the caller may read: 404 when absent, 403 when not theirs.
pub async fn viewable_student(
    proxy: &DatabaseProxy,
    user: &AuthUser,
    student_id: i64,
) -> Result<StudentRow, AppError> {
    let student = students::find(proxy, student_id)
        .await?
        .ok_or_else(|| AppError::not_found("Student not found"))?;
    if !can_view_student(user, &student) {
        return Err(AppError::forbidden("No access to this student"));
    }
    Ok(student)
}

/// A task addressed together with a student must be assigned to that student.
///
/// A mismatch reads as an unknown task so other students' tasks stay hidden.
pub fn ensure_task_of_student(task: &TaskRow, student_id: i64) -> Result<(), AppError> {
    if task.student_id != student_id {
        return Err(AppError::not_found("Task not found"));
    }
    Ok(())
}

/// Attempts made by `student_id`, as core records.
pub fn attempts_of_student(rows: &[AttemptRow], student_id: i64) -> Vec<AttemptRecord> {
    rows.iter()
        .filter(|attempt| attempt.student_id == student_id)
        .map(AttemptRow::to_record)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::json;

    fn student(user_id: Option<i64>, parent_id: Option<i64>) -> StudentRow {
        StudentRow {
            id: 1,
            user_id,
            parent_id,
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            middle_name: None,
            birth_date: None,
            grade: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_visibility_by_role() {
        let row = student(Some(10), Some(20));

        assert!(can_view_student(&AuthUser { id: 99, role: Role::Tutor }, &row));
        assert!(can_view_student(&AuthUser { id: 20, role: Role::Parent }, &row));
        assert!(!can_view_student(&AuthUser { id: 21, role: Role::Parent }, &row));
        assert!(can_view_student(&AuthUser { id: 10, role: Role::Student }, &row));
        assert!(!can_view_student(&AuthUser { id: 20, role: Role::Student }, &row));
    }

    #[test]
    fn test_unlinked_student_hidden_from_families() {
        let row = student(None, None);
        assert!(!can_view_student(&AuthUser { id: 1, role: Role::Parent }, &row));
        assert!(!can_view_student(&AuthUser { id: 1, role: Role::Student }, &row));
        assert!(can_view_student(&AuthUser { id: 1, role: Role::Admin }, &row));
    }

    fn task(student_id: i64) -> TaskRow {
        TaskRow {
            id: 7,
            title: "Fractions".into(),
            template_id: None,
            student_id,
            iep_goal_id: None,
            subject: "math".into(),
            topic: "fractions".into(),
            difficulty: 3,
            content: json!({}),
            adaptations: json!({}),
            status: "active".into(),
            is_ai_generated: false,
            generation_metadata: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn attempt(id: i64, student_id: i64) -> AttemptRow {
        AttemptRow {
            id,
            task_id: 7,
            student_id,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            score: Some(90.0),
            is_correct: Some(true),
            hints_used: 0,
            time_spent: Some(60),
            answers: json!({}),
            feedback: None,
            scaffolding_level_used: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_task_of_other_student_is_not_found() {
        assert!(ensure_task_of_student(&task(1), 1).is_ok());

        let err = ensure_task_of_student(&task(2), 1).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_history_keeps_only_own_attempts() {
        let rows = vec![attempt(1, 1), attempt(2, 2), attempt(3, 1)];

        let history = attempts_of_student(&rows, 1);

        let ids: Vec<i64> = history.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
