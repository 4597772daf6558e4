//! Loading stored rows as plain analytics records.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveTime};

use adaptive_algo::progress::DAYS_PER_WEEK;
use adaptive_algo::{AttemptRecord, IepRecord, TaskRecord};

use crate::db::operations::{attempts, iep, students, tasks};
use crate::db::DatabaseProxy;
use crate::response::AppError;
use crate::services::generator::StudentContext;

/// Tasks of one student with their attempts attached.
pub async fn task_records(proxy: &DatabaseProxy, student_id: i64) -> Result<Vec<TaskRecord>, sqlx::Error> {
    let rows = tasks::tasks_for_student(proxy, student_id).await?;
    attach_attempts(proxy, rows).await
}

/// Tasks linked to one IEP goal with their attempts attached.
pub async fn goal_task_records(proxy: &DatabaseProxy, goal_id: i64) -> Result<Vec<TaskRecord>, sqlx::Error> {
    let rows = tasks::tasks_for_goal(proxy, goal_id).await?;
    attach_attempts(proxy, rows).await
}

async fn attach_attempts(
    proxy: &DatabaseProxy,
    rows: Vec<tasks::TaskRow>,
) -> Result<Vec<TaskRecord>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = rows.iter().map(|t| t.id).collect();

    let mut by_task: HashMap<i64, Vec<AttemptRecord>> = HashMap::new();
    for attempt in attempts::list_for_tasks(proxy, &ids).await? {
        by_task
            .entry(attempt.task_id)
            .or_default()
            .push(attempt.to_record());
    }

    Ok(rows
        .iter()
        .map(|row| row.to_record(by_task.remove(&row.id).unwrap_or_default()))
        .collect())
}

pub async fn iep_records(proxy: &DatabaseProxy, student_id: i64) -> Result<Vec<IepRecord>, sqlx::Error> {
    Ok(iep::list_by_student(proxy, student_id)
        .await?
        .iter()
        .map(iep::IepWithGoals::to_record)
        .collect())
}

/// Attempts started during the seven days from `week_start`.
pub async fn week_attempts(
    proxy: &DatabaseProxy,
    student_id: i64,
    week_start: NaiveDate,
) -> Result<Vec<AttemptRecord>, sqlx::Error> {
    let from = week_start.and_time(NaiveTime::MIN).and_utc();
    let to = from + Duration::days(DAYS_PER_WEEK as i64);
    Ok(attempts::list_for_student_between(proxy, student_id, from, to)
        .await?
        .iter()
        .map(attempts::AttemptRow::to_record)
        .collect())
}

/// Student plus profile, shaped for the task generator.
pub async fn student_context(proxy: &DatabaseProxy, student_id: i64) -> Result<StudentContext, AppError> {
    let student = students::find(proxy, student_id)
        .await?
        .ok_or_else(|| AppError::not_found("Student not found"))?;
    let profile = students::find_profile(proxy, student_id)
        .await?
        .ok_or_else(|| AppError::not_found("Student profile not found"))?;

    Ok(StudentContext {
        student_id,
        grade: student.grade,
        disabilities: profile.disability_types.clone(),
        learning_style: profile.learning_style(),
        scaffolding: profile.scaffolding(),
        current_difficulty: profile.difficulty(),
        settings: profile.interface_settings(),
    })
}
