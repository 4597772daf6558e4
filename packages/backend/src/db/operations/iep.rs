use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

use adaptive_algo::progress::goal_percent;
use adaptive_algo::{GoalRecord, GoalStatus, IepRecord, IepStatus};

use crate::db::DatabaseProxy;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IepRow {
    pub id: i64,
    pub student_id: i64,
    pub created_by_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: String,
    pub extra_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GoalRow {
    pub id: i64,
    pub iep_id: i64,
    pub subject: String,
    pub title: String,
    pub description: Option<String>,
    pub target_metric: Option<String>,
    pub target_value: Option<f64>,
    pub current_value: f64,
    pub status: String,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GoalRow {
    pub fn progress_percent(&self) -> f64 {
        goal_percent(self.current_value, self.target_value.unwrap_or(0.0))
    }

    pub fn to_record(&self) -> GoalRecord {
        GoalRecord {
            id: self.id,
            iep_id: self.iep_id,
            title: self.title.clone(),
            description: self.description.clone(),
            status: GoalStatus::parse(&self.status).unwrap_or_default(),
            current_value: self.current_value,
            target_value: self.target_value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalResponse {
    #[serde(flatten)]
    pub goal: GoalRow,
    pub progress_percent: f64,
}

impl From<GoalRow> for GoalResponse {
    fn from(goal: GoalRow) -> Self {
        Self {
            progress_percent: goal.progress_percent(),
            goal,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IepWithGoals {
    #[serde(flatten)]
    pub iep: IepRow,
    pub goals: Vec<GoalResponse>,
}

impl IepWithGoals {
    pub fn to_record(&self) -> IepRecord {
        IepRecord {
            id: self.iep.id,
            student_id: self.iep.student_id,
            status: IepStatus::parse(&self.iep.status).unwrap_or_default(),
            goals: self.goals.iter().map(|g| g.goal.to_record()).collect(),
        }
    }
}

pub struct NewIep<'a> {
    pub student_id: i64,
    pub created_by_id: i64,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: IepStatus,
    pub extra_data: Value,
}

#[derive(Debug, Default)]
pub struct IepChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<IepStatus>,
    pub extra_data: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub subject: String,
    pub title: String,
    pub description: Option<String>,
    pub target_metric: Option<String>,
    pub target_value: Option<f64>,
    pub order: i32,
}

#[derive(Debug, Default)]
pub struct GoalChanges {
    pub subject: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_metric: Option<String>,
    pub target_value: Option<f64>,
    pub current_value: Option<f64>,
    pub status: Option<GoalStatus>,
    pub order: Option<i32>,
}

async fn attach_goals(proxy: &DatabaseProxy, ieps: Vec<IepRow>) -> Result<Vec<IepWithGoals>, sqlx::Error> {
    let ids: Vec<i64> = ieps.iter().map(|iep| iep.id).collect();
    let mut goals = sqlx::query_as::<_, GoalRow>(
        r#"SELECT * FROM iep_goals WHERE iep_id = ANY($1) ORDER BY iep_id, "order", id"#,
    )
    .bind(&ids)
    .fetch_all(proxy.pool())
    .await?;

    Ok(ieps
        .into_iter()
        .map(|iep| {
            let (mine, rest): (Vec<GoalRow>, Vec<GoalRow>) =
                goals.drain(..).partition(|g| g.iep_id == iep.id);
            goals = rest;
            IepWithGoals {
                iep,
                goals: mine.into_iter().map(GoalResponse::from).collect(),
            }
        })
        .collect())
}

pub async fn find(proxy: &DatabaseProxy, id: i64) -> Result<Option<IepWithGoals>, sqlx::Error> {
    let Some(row) = sqlx::query_as::<_, IepRow>("SELECT * FROM ieps WHERE id = $1")
        .bind(id)
        .fetch_optional(proxy.pool())
        .await?
    else {
        return Ok(None);
    };
    Ok(attach_goals(proxy, vec![row]).await?.pop())
}

pub async fn list(
    proxy: &DatabaseProxy,
    skip: i64,
    limit: i64,
    student_id: Option<i64>,
) -> Result<Vec<IepWithGoals>, sqlx::Error> {
    let rows = sqlx::query_as::<_, IepRow>(
        r#"
        SELECT * FROM ieps
        WHERE ($1::bigint IS NULL OR student_id = $1)
        ORDER BY id
        OFFSET $2 LIMIT $3
        "#,
    )
    .bind(student_id)
    .bind(skip)
    .bind(limit)
    .fetch_all(proxy.pool())
    .await?;
    attach_goals(proxy, rows).await
}

pub async fn list_by_student(proxy: &DatabaseProxy, student_id: i64) -> Result<Vec<IepWithGoals>, sqlx::Error> {
    let rows = sqlx::query_as::<_, IepRow>(
        "SELECT * FROM ieps WHERE student_id = $1 ORDER BY start_date DESC, id DESC",
    )
    .bind(student_id)
    .fetch_all(proxy.pool())
    .await?;
    attach_goals(proxy, rows).await
}

/// Insert an IEP and its initial goals in one transaction.
pub async fn insert(
    proxy: &DatabaseProxy,
    iep: &NewIep<'_>,
    goals: &[NewGoal],
) -> Result<IepWithGoals, sqlx::Error> {
    let mut tx = proxy.pool().begin().await?;

    let row = sqlx::query_as::<_, IepRow>(
        r#"
        INSERT INTO ieps (student_id, created_by_id, title, description, start_date, end_date, status, extra_data)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(iep.student_id)
    .bind(iep.created_by_id)
    .bind(iep.title)
    .bind(iep.description)
    .bind(iep.start_date)
    .bind(iep.end_date)
    .bind(iep.status.as_str())
    .bind(&iep.extra_data)
    .fetch_one(&mut *tx)
    .await?;

    let mut created = Vec::with_capacity(goals.len());
    for goal in goals {
        let goal_row = sqlx::query_as::<_, GoalRow>(INSERT_GOAL)
            .bind(row.id)
            .bind(&goal.subject)
            .bind(&goal.title)
            .bind(goal.description.as_deref())
            .bind(goal.target_metric.as_deref())
            .bind(goal.target_value)
            .bind(goal.order)
            .fetch_one(&mut *tx)
            .await?;
        created.push(GoalResponse::from(goal_row));
    }

    tx.commit().await?;

    Ok(IepWithGoals { iep: row, goals: created })
}

const INSERT_GOAL: &str = r#"
    INSERT INTO iep_goals (iep_id, subject, title, description, target_metric, target_value, "order")
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    RETURNING *
"#;

pub async fn update(
    proxy: &DatabaseProxy,
    id: i64,
    changes: &IepChanges,
) -> Result<Option<IepWithGoals>, sqlx::Error> {
    let Some(row) = sqlx::query_as::<_, IepRow>(
        r#"
        UPDATE ieps SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            start_date = COALESCE($4, start_date),
            end_date = COALESCE($5, end_date),
            status = COALESCE($6, status),
            extra_data = COALESCE($7, extra_data),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(changes.title.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.start_date)
    .bind(changes.end_date)
    .bind(changes.status.map(|s| s.as_str()))
    .bind(changes.extra_data.as_ref())
    .fetch_optional(proxy.pool())
    .await?
    else {
        return Ok(None);
    };
    Ok(attach_goals(proxy, vec![row]).await?.pop())
}

pub async fn active_iep_id(proxy: &DatabaseProxy, student_id: i64) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM ieps WHERE student_id = $1 AND status = 'active'")
        .bind(student_id)
        .fetch_optional(proxy.pool())
        .await
}

pub async fn delete(proxy: &DatabaseProxy, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM ieps WHERE id = $1")
        .bind(id)
        .execute(proxy.pool())
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_goal(proxy: &DatabaseProxy, goal_id: i64) -> Result<Option<GoalRow>, sqlx::Error> {
    sqlx::query_as::<_, GoalRow>("SELECT * FROM iep_goals WHERE id = $1")
        .bind(goal_id)
        .fetch_optional(proxy.pool())
        .await
}

/// Goals of every IEP the student has.
pub async fn goals_for_student(proxy: &DatabaseProxy, student_id: i64) -> Result<Vec<GoalRow>, sqlx::Error> {
    sqlx::query_as::<_, GoalRow>(
        r#"
        SELECT g.* FROM iep_goals g
        JOIN ieps i ON i.id = g.iep_id
        WHERE i.student_id = $1
        ORDER BY g.iep_id, g."order", g.id
        "#,
    )
    .bind(student_id)
    .fetch_all(proxy.pool())
    .await
}

pub async fn insert_goal(proxy: &DatabaseProxy, iep_id: i64, goal: &NewGoal) -> Result<GoalRow, sqlx::Error> {
    sqlx::query_as::<_, GoalRow>(INSERT_GOAL)
        .bind(iep_id)
        .bind(&goal.subject)
        .bind(&goal.title)
        .bind(goal.description.as_deref())
        .bind(goal.target_metric.as_deref())
        .bind(goal.target_value)
        .bind(goal.order)
        .fetch_one(proxy.pool())
        .await
}

pub async fn update_goal(
    proxy: &DatabaseProxy,
    iep_id: i64,
    goal_id: i64,
    changes: &GoalChanges,
) -> Result<Option<GoalRow>, sqlx::Error> {
    sqlx::query_as::<_, GoalRow>(
        r#"
        UPDATE iep_goals SET
            subject = COALESCE($3, subject),
            title = COALESCE($4, title),
            description = COALESCE($5, description),
            target_metric = COALESCE($6, target_metric),
            target_value = COALESCE($7, target_value),
            current_value = COALESCE($8, current_value),
            status = COALESCE($9, status),
            "order" = COALESCE($10, "order"),
            updated_at = NOW()
        WHERE id = $2 AND iep_id = $1
        RETURNING *
        "#,
    )
    .bind(iep_id)
    .bind(goal_id)
    .bind(changes.subject.as_deref())
    .bind(changes.title.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.target_metric.as_deref())
    .bind(changes.target_value)
    .bind(changes.current_value)
    .bind(changes.status.map(|s| s.as_str()))
    .bind(changes.order)
    .fetch_optional(proxy.pool())
    .await
}

pub async fn delete_goal(proxy: &DatabaseProxy, iep_id: i64, goal_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM iep_goals WHERE id = $2 AND iep_id = $1")
        .bind(iep_id)
        .bind(goal_id)
        .execute(proxy.pool())
        .await?;
    Ok(result.rows_affected() > 0)
}
