use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

use adaptive_algo::{DifficultyLevel, InterfaceSettings, LearningStyle, ScaffoldingLevel};

use crate::db::DatabaseProxy;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudentRow {
    pub id: i64,
    pub user_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub grade: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProfileRow {
    pub id: i64,
    pub student_id: i64,
    pub disability_types: Vec<String>,
    pub learning_style: Option<String>,
    pub scaffolding_level: i32,
    pub current_difficulty: i32,
    pub font_size: i32,
    pub line_height: f64,
    pub color_scheme: String,
    pub audio_enabled: bool,
    pub animations_enabled: bool,
    pub preferred_pace: Option<i32>,
    pub interests: Value,
    pub settings: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRow {
    pub fn learning_style(&self) -> Option<LearningStyle> {
        self.learning_style.as_deref().and_then(LearningStyle::parse)
    }

    pub fn scaffolding(&self) -> Option<ScaffoldingLevel> {
        u8::try_from(self.scaffolding_level)
            .ok()
            .and_then(ScaffoldingLevel::from_value)
    }

    pub fn difficulty(&self) -> DifficultyLevel {
        u8::try_from(self.current_difficulty)
            .ok()
            .and_then(DifficultyLevel::from_value)
            .unwrap_or(DifficultyLevel::Easy)
    }

    pub fn interface_settings(&self) -> InterfaceSettings {
        InterfaceSettings {
            font_size: u32::try_from(self.font_size).unwrap_or(adaptive_algo::DEFAULT_FONT_SIZE),
            line_height: self.line_height,
            color_scheme: self.color_scheme.clone(),
            audio_enabled: self.audio_enabled,
            animations_enabled: self.animations_enabled,
            preferred_pace: self.preferred_pace.and_then(|p| u32::try_from(p).ok()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentWithProfile {
    #[serde(flatten)]
    pub student: StudentRow,
    pub profile: Option<ProfileRow>,
}

pub struct NewStudent<'a> {
    pub user_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub middle_name: Option<&'a str>,
    pub birth_date: Option<NaiveDate>,
    pub grade: i32,
}

#[derive(Debug, Default)]
pub struct StudentChanges {
    pub parent_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub grade: Option<i32>,
}

#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub disability_types: Option<Vec<String>>,
    pub learning_style: Option<String>,
    pub scaffolding_level: Option<i32>,
    pub current_difficulty: Option<i32>,
    pub font_size: Option<i32>,
    pub line_height: Option<f64>,
    pub color_scheme: Option<String>,
    pub audio_enabled: Option<bool>,
    pub animations_enabled: Option<bool>,
    pub preferred_pace: Option<i32>,
    pub interests: Option<Value>,
    pub settings: Option<Value>,
}

pub async fn find(proxy: &DatabaseProxy, id: i64) -> Result<Option<StudentRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE id = $1")
        .bind(id)
        .fetch_optional(proxy.pool())
        .await
}

pub async fn find_profile(proxy: &DatabaseProxy, student_id: i64) -> Result<Option<ProfileRow>, sqlx::Error> {
    sqlx::query_as::<_, ProfileRow>("SELECT * FROM student_profiles WHERE student_id = $1")
        .bind(student_id)
        .fetch_optional(proxy.pool())
        .await
}

pub async fn find_with_profile(
    proxy: &DatabaseProxy,
    id: i64,
) -> Result<Option<StudentWithProfile>, sqlx::Error> {
    let Some(student) = find(proxy, id).await? else {
        return Ok(None);
    };
    let profile = find_profile(proxy, id).await?;
    Ok(Some(StudentWithProfile { student, profile }))
}

pub async fn list(proxy: &DatabaseProxy, skip: i64, limit: i64) -> Result<Vec<StudentRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentRow>("SELECT * FROM students ORDER BY id OFFSET $1 LIMIT $2")
        .bind(skip)
        .bind(limit)
        .fetch_all(proxy.pool())
        .await
}

pub async fn list_by_parent(proxy: &DatabaseProxy, parent_id: i64) -> Result<Vec<StudentRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentRow>("SELECT * FROM students WHERE parent_id = $1 ORDER BY id")
        .bind(parent_id)
        .fetch_all(proxy.pool())
        .await
}

/// Insert a student together with a default profile.
pub async fn insert(proxy: &DatabaseProxy, student: &NewStudent<'_>) -> Result<StudentWithProfile, sqlx::Error> {
    let mut tx = proxy.pool().begin().await?;

    let row = sqlx::query_as::<_, StudentRow>(
        r#"
        INSERT INTO students (user_id, parent_id, first_name, last_name, middle_name, birth_date, grade)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(student.user_id)
    .bind(student.parent_id)
    .bind(student.first_name)
    .bind(student.last_name)
    .bind(student.middle_name)
    .bind(student.birth_date)
    .bind(student.grade)
    .fetch_one(&mut *tx)
    .await?;

    let profile = sqlx::query_as::<_, ProfileRow>(
        "INSERT INTO student_profiles (student_id) VALUES ($1) RETURNING *",
    )
    .bind(row.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(StudentWithProfile {
        student: row,
        profile: Some(profile),
    })
}

pub async fn update(
    proxy: &DatabaseProxy,
    id: i64,
    changes: &StudentChanges,
) -> Result<Option<StudentRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentRow>(
        r#"
        UPDATE students SET
            parent_id = COALESCE($2, parent_id),
            first_name = COALESCE($3, first_name),
            last_name = COALESCE($4, last_name),
            middle_name = COALESCE($5, middle_name),
            birth_date = COALESCE($6, birth_date),
            grade = COALESCE($7, grade),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(changes.parent_id)
    .bind(changes.first_name.as_deref())
    .bind(changes.last_name.as_deref())
    .bind(changes.middle_name.as_deref())
    .bind(changes.birth_date)
    .bind(changes.grade)
    .fetch_optional(proxy.pool())
    .await
}

pub async fn update_profile(
    proxy: &DatabaseProxy,
    student_id: i64,
    changes: &ProfileChanges,
) -> Result<Option<ProfileRow>, sqlx::Error> {
    sqlx::query_as::<_, ProfileRow>(
        r#"
        UPDATE student_profiles SET
            disability_types = COALESCE($2, disability_types),
            learning_style = COALESCE($3, learning_style),
            scaffolding_level = COALESCE($4, scaffolding_level),
            current_difficulty = COALESCE($5, current_difficulty),
            font_size = COALESCE($6, font_size),
            line_height = COALESCE($7, line_height),
            color_scheme = COALESCE($8, color_scheme),
            audio_enabled = COALESCE($9, audio_enabled),
            animations_enabled = COALESCE($10, animations_enabled),
            preferred_pace = COALESCE($11, preferred_pace),
            interests = COALESCE($12, interests),
            settings = COALESCE($13, settings),
            updated_at = NOW()
        WHERE student_id = $1
        RETURNING *
        "#,
    )
    .bind(student_id)
    .bind(changes.disability_types.as_deref())
    .bind(changes.learning_style.as_deref())
    .bind(changes.scaffolding_level)
    .bind(changes.current_difficulty)
    .bind(changes.font_size)
    .bind(changes.line_height)
    .bind(changes.color_scheme.as_deref())
    .bind(changes.audio_enabled)
    .bind(changes.animations_enabled)
    .bind(changes.preferred_pace)
    .bind(changes.interests.as_ref())
    .bind(changes.settings.as_ref())
    .fetch_optional(proxy.pool())
    .await
}

pub async fn delete(proxy: &DatabaseProxy, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM students WHERE id = $1")
        .bind(id)
        .execute(proxy.pool())
        .await?;
    Ok(result.rows_affected() > 0)
}
