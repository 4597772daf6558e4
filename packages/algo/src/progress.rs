//! Progress aggregation
//!
//! Summaries, per-subject standing, IEP goal counts and weekly activity,
//! all recomputed from task/attempt history on every call. Nothing here is
//! cached; empty histories produce zero-valued results.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::sanitize::{mean, percent, round2, sanitize_score};
use crate::types::{DifficultyLevel, GoalStatus, IepStatus, Subject, TaskStatus};

/// Topic mean below this is weak.
pub const WEAK_TOPIC_THRESHOLD: f64 = 60.0;
/// Topic mean at or above this is strong.
pub const STRONG_TOPIC_THRESHOLD: f64 = 80.0;

/// Second half above `first * IMPROVING_FACTOR` is improving.
pub const IMPROVING_FACTOR: f64 = 1.2;
/// Second half below `first * DECLINING_FACTOR` is declining.
pub const DECLINING_FACTOR: f64 = 0.8;

/// Average daily completions below this triggers the practice reminder.
pub const LOW_ACTIVITY_DAILY_TASKS: f64 = 2.0;

pub const DAYS_PER_WEEK: usize = 7;

pub const MSG_PRACTICE_MORE: &str = "Try to complete at least 2-3 tasks a day";
pub const MSG_RESTART_EASY: &str = "Don't give up! Try starting again with easier tasks";
pub const MSG_KEEP_GOING: &str = "Great progress! Keep it up!";

// ==================== Records ====================

/// One attempt at a task. `completed_at` is written once, on submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: i64,
    pub task_id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// 0-100
    pub score: Option<f64>,
    pub is_correct: Option<bool>,
    pub hints_used: u32,
    /// Seconds
    pub time_spent: Option<u32>,
}

impl AttemptRecord {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Score of a completed attempt, clamped to 0-100.
    pub fn completed_score(&self) -> Option<f64> {
        if self.is_completed() {
            self.score.and_then(sanitize_score)
        } else {
            None
        }
    }

    /// One-way submission. A second submission is rejected.
    ///
    /// Without an explicit score a correct answer records 100 and an
    /// incorrect one 0; with neither, the score stays unset.
    pub fn submit(
        mut self,
        completed_at: DateTime<Utc>,
        score: Option<f64>,
        is_correct: Option<bool>,
        time_spent: Option<u32>,
    ) -> AnalyticsResult<Self> {
        if self.is_completed() {
            return Err(AnalyticsError::Validation(format!(
                "attempt {} already submitted",
                self.id
            )));
        }

        let score = score
            .and_then(sanitize_score)
            .or_else(|| is_correct.map(|correct| if correct { 100.0 } else { 0.0 }));

        self.completed_at = Some(completed_at);
        self.score = score;
        self.is_correct = is_correct;
        if time_spent.is_some() {
            self.time_spent = time_spent;
        } else {
            let elapsed = (completed_at - self.started_at).num_seconds().max(0);
            self.time_spent = Some(u32::try_from(elapsed).unwrap_or(u32::MAX));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub subject: Subject,
    pub topic: String,
    pub difficulty: DifficultyLevel,
    pub status: TaskStatus,
    pub iep_goal_id: Option<i64>,
    pub attempts: Vec<AttemptRecord>,
}

impl TaskRecord {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    fn completed_attempts(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.attempts.iter().filter(|a| a.is_completed())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRecord {
    pub id: i64,
    pub iep_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: GoalStatus,
    pub current_value: f64,
    pub target_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IepRecord {
    pub id: i64,
    pub student_id: i64,
    pub status: IepStatus,
    pub goals: Vec<GoalRecord>,
}

// ==================== Summary ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub student_id: i64,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub correct_answers: usize,
    pub average_score: f64,
    pub average_time_spent: f64,
    pub total_hints_used: u64,
    pub completion_rate: f64,
}

pub fn summarize(student_id: i64, tasks: &[TaskRecord]) -> ProgressSummary {
    let total_tasks = tasks.len();
    let completed_tasks = tasks.iter().filter(|t| t.is_completed()).count();

    let completed: Vec<&AttemptRecord> = tasks.iter().flat_map(|t| t.completed_attempts()).collect();

    let correct_answers = completed.iter().filter(|a| a.is_correct == Some(true)).count();
    let average_score = mean(completed.iter().filter_map(|a| a.completed_score()));
    let average_time_spent = mean(completed.iter().filter_map(|a| a.time_spent.map(f64::from)));
    let total_hints_used = completed.iter().map(|a| u64::from(a.hints_used)).sum();

    ProgressSummary {
        student_id,
        total_tasks,
        completed_tasks,
        correct_answers,
        average_score: round2(average_score),
        average_time_spent: round2(average_time_spent),
        total_hints_used,
        completion_rate: round2(percent(completed_tasks, total_tasks)),
    }
}

// ==================== Subject progress ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStanding {
    Weak,
    Neutral,
    Strong,
}

pub fn classify_topic(mean_score: f64) -> TopicStanding {
    if mean_score < WEAK_TOPIC_THRESHOLD {
        TopicStanding::Weak
    } else if mean_score >= STRONG_TOPIC_THRESHOLD {
        TopicStanding::Strong
    } else {
        TopicStanding::Neutral
    }
}

/// Next difficulty tier from an overall subject average.
pub fn difficulty_for_average(average: f64) -> DifficultyLevel {
    if average >= 85.0 {
        DifficultyLevel::Hard
    } else if average >= 70.0 {
        DifficultyLevel::Medium
    } else if average >= 50.0 {
        DifficultyLevel::Easy
    } else {
        DifficultyLevel::VeryEasy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProgress {
    pub subject: Subject,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub average_score: f64,
    pub current_difficulty: DifficultyLevel,
    pub topics_covered: Vec<String>,
    pub weak_topics: Vec<String>,
    pub strong_topics: Vec<String>,
}

/// Progress for one subject. `tasks` may span subjects; others are skipped.
pub fn subject_progress(subject: Subject, tasks: &[TaskRecord]) -> SubjectProgress {
    let subject_tasks: Vec<&TaskRecord> = tasks.iter().filter(|t| t.subject == subject).collect();

    // (topic, scores) in first-seen order
    let mut topics: Vec<(String, Vec<f64>)> = Vec::new();
    for task in &subject_tasks {
        let scores = task.completed_attempts().filter_map(|a| a.completed_score());
        match topics.iter_mut().find(|(topic, _)| *topic == task.topic) {
            Some((_, bucket)) => bucket.extend(scores),
            None => topics.push((task.topic.clone(), scores.collect())),
        }
    }

    let mut weak_topics = Vec::new();
    let mut strong_topics = Vec::new();
    for (topic, scores) in topics.iter().filter(|(_, scores)| !scores.is_empty()) {
        match classify_topic(mean(scores.iter().copied())) {
            TopicStanding::Weak => weak_topics.push(topic.clone()),
            TopicStanding::Strong => strong_topics.push(topic.clone()),
            TopicStanding::Neutral => {}
        }
    }

    let overall = mean(topics.iter().flat_map(|(_, scores)| scores.iter().copied()));

    SubjectProgress {
        subject,
        total_tasks: subject_tasks.len(),
        completed_tasks: subject_tasks.iter().filter(|t| t.is_completed()).count(),
        average_score: round2(overall),
        current_difficulty: difficulty_for_average(overall),
        topics_covered: topics.into_iter().map(|(topic, _)| topic).collect(),
        weak_topics,
        strong_topics,
    }
}

// ==================== IEP progress ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IepProgress {
    pub iep_id: i64,
    pub student_id: i64,
    pub total_goals: usize,
    pub achieved_goals: usize,
    pub in_progress_goals: usize,
    pub not_started_goals: usize,
    pub overall_progress: f64,
}

/// Goal counts for the student's active IEP; `None` when there is none.
pub fn iep_progress(student_id: i64, ieps: &[IepRecord]) -> Option<IepProgress> {
    let iep = ieps
        .iter()
        .find(|iep| iep.student_id == student_id && iep.status == IepStatus::Active)?;

    let count = |status: GoalStatus| iep.goals.iter().filter(|g| g.status == status).count();
    let total_goals = iep.goals.len();
    let achieved_goals = count(GoalStatus::Achieved);

    Some(IepProgress {
        iep_id: iep.id,
        student_id,
        total_goals,
        achieved_goals,
        in_progress_goals: count(GoalStatus::InProgress),
        not_started_goals: count(GoalStatus::NotStarted),
        overall_progress: round2(percent(achieved_goals, total_goals)),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub goal_id: i64,
    pub goal_description: Option<String>,
    pub status: GoalStatus,
    pub current_progress: f64,
    pub target_value: f64,
    pub tasks_completed: usize,
    pub average_score: f64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Progress of one goal from the tasks linked to it.
pub fn goal_progress(
    goal_id: i64,
    goals: &[GoalRecord],
    tasks: &[TaskRecord],
) -> AnalyticsResult<GoalProgress> {
    let goal = goals
        .iter()
        .find(|g| g.id == goal_id)
        .ok_or_else(|| AnalyticsError::NotFound(format!("goal {goal_id}")))?;

    let linked: Vec<&TaskRecord> = tasks
        .iter()
        .filter(|t| t.iep_goal_id == Some(goal_id))
        .collect();

    let attempts: Vec<&AttemptRecord> = linked.iter().flat_map(|t| t.completed_attempts()).collect();

    Ok(GoalProgress {
        goal_id: goal.id,
        goal_description: goal.description.clone(),
        status: goal.status,
        current_progress: goal.current_value,
        target_value: goal.target_value.unwrap_or(100.0),
        tasks_completed: linked.iter().filter(|t| t.is_completed()).count(),
        average_score: round2(mean(attempts.iter().filter_map(|a| a.completed_score()))),
        last_activity: attempts.iter().filter_map(|a| a.completed_at).max(),
    })
}

/// `current / target * 100`, capped at 100; 0 for a zero target.
pub fn goal_percent(current_value: f64, target_value: f64) -> f64 {
    if target_value == 0.0 {
        return 0.0;
    }
    (current_value / target_value * 100.0).min(100.0)
}

// ==================== Daily / weekly ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub tasks_attempted: usize,
    pub tasks_completed: usize,
    pub correct_answers: usize,
    pub time_spent: u64,
    pub hints_used: u64,
}

/// Activity for the attempts started on `date` (UTC).
pub fn daily_stats(date: NaiveDate, attempts: &[AttemptRecord]) -> DailyStats {
    let day: Vec<&AttemptRecord> = attempts
        .iter()
        .filter(|a| a.started_at.date_naive() == date)
        .collect();

    DailyStats {
        date,
        tasks_attempted: day.len(),
        tasks_completed: day.iter().filter(|a| a.is_completed()).count(),
        correct_answers: day.iter().filter(|a| a.is_correct == Some(true)).count(),
        time_spent: day.iter().filter_map(|a| a.time_spent).map(u64::from).sum(),
        hints_used: day.iter().map(|a| u64::from(a.hints_used)).sum(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }
}

/// Compare days 4-6 against days 0-3 of a week of completion counts.
pub fn classify_trend(daily_completions: &[usize; DAYS_PER_WEEK]) -> Trend {
    let first_half: usize = daily_completions[..4].iter().sum();
    let second_half: usize = daily_completions[4..].iter().sum();
    let (first, second) = (first_half as f64, second_half as f64);

    if second > first * IMPROVING_FACTOR {
        Trend::Improving
    } else if second < first * DECLINING_FACTOR {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

pub fn weekly_recommendations(average_daily_tasks: f64, trend: Trend) -> Vec<String> {
    let mut recommendations = Vec::new();
    if average_daily_tasks < LOW_ACTIVITY_DAILY_TASKS {
        recommendations.push(MSG_PRACTICE_MORE.to_string());
    }
    match trend {
        Trend::Declining => recommendations.push(MSG_RESTART_EASY.to_string()),
        Trend::Improving => recommendations.push(MSG_KEEP_GOING.to_string()),
        Trend::Stable => {}
    }
    recommendations
}

/// Monday of the week containing `today`.
pub fn week_start_for(today: NaiveDate) -> NaiveDate {
    today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub student_id: i64,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub daily_stats: Vec<DailyStats>,
    pub total_tasks: usize,
    pub average_daily_tasks: f64,
    pub improvement_trend: Trend,
    pub recommendations: Vec<String>,
}

/// Seven days of activity from `week_start`, or from the Monday of `today`'s week.
pub fn weekly_report(
    student_id: i64,
    week_start: Option<NaiveDate>,
    today: NaiveDate,
    attempts: &[AttemptRecord],
) -> WeeklyReport {
    let start = week_start.unwrap_or_else(|| week_start_for(today));

    let daily: Vec<DailyStats> = (0..DAYS_PER_WEEK as i64)
        .map(|offset| daily_stats(start + Duration::days(offset), attempts))
        .collect();

    let mut completions = [0usize; DAYS_PER_WEEK];
    for (slot, day) in completions.iter_mut().zip(&daily) {
        *slot = day.tasks_completed;
    }

    let total_tasks: usize = completions.iter().sum();
    let average_daily_tasks = total_tasks as f64 / DAYS_PER_WEEK as f64;
    let trend = classify_trend(&completions);

    WeeklyReport {
        student_id,
        week_start: start,
        week_end: start + Duration::days(DAYS_PER_WEEK as i64 - 1),
        daily_stats: daily,
        total_tasks,
        average_daily_tasks: round2(average_daily_tasks),
        improvement_trend: trend,
        recommendations: weekly_recommendations(average_daily_tasks, trend),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, day, hour, 0, 0).unwrap()
    }

    fn attempt(id: i64, task_id: i64, score: Option<f64>, completed: bool) -> AttemptRecord {
        AttemptRecord {
            id,
            task_id,
            started_at: at(2, 9),
            completed_at: completed.then(|| at(2, 10)),
            score,
            is_correct: score.map(|s| s >= 50.0),
            hints_used: 1,
            time_spent: Some(120),
        }
    }

    fn task(id: i64, subject: Subject, topic: &str, status: TaskStatus, scores: &[f64]) -> TaskRecord {
        TaskRecord {
            id,
            subject,
            topic: topic.to_string(),
            difficulty: DifficultyLevel::Medium,
            status,
            iep_goal_id: None,
            attempts: scores
                .iter()
                .enumerate()
                .map(|(i, s)| attempt(id * 100 + i as i64, id, Some(*s), true))
                .collect(),
        }
    }

    #[test]
    fn test_summary_empty_history() {
        let summary = summarize(7, &[]);
        assert_eq!(summary.total_tasks, 0);
        assert_eq!(summary.completion_rate, 0.0);
        assert_eq!(summary.average_score, 0.0);
        assert_eq!(summary.total_hints_used, 0);
    }

    #[test]
    fn test_summary_all_completed_is_100_percent() {
        let tasks = vec![
            task(1, Subject::Math, "fractions", TaskStatus::Completed, &[80.0]),
            task(2, Subject::Math, "fractions", TaskStatus::Completed, &[40.0]),
        ];
        let summary = summarize(1, &tasks);
        assert_eq!(summary.completion_rate, 100.0);
        assert_eq!(summary.average_score, 60.0);
        assert_eq!(summary.correct_answers, 1);
        assert_eq!(summary.average_time_spent, 120.0);
        assert_eq!(summary.total_hints_used, 2);
    }

    #[test]
    fn test_summary_ignores_unfinished_attempts() {
        let mut t = task(1, Subject::Math, "fractions", TaskStatus::Active, &[90.0]);
        t.attempts.push(attempt(999, 1, Some(10.0), false));
        let summary = summarize(1, &[t]);
        assert_eq!(summary.average_score, 90.0);
        assert_eq!(summary.total_hints_used, 1);
        assert_eq!(summary.completion_rate, 0.0);
    }

    #[test]
    fn test_topic_thresholds() {
        assert_eq!(classify_topic(59.9), TopicStanding::Weak);
        assert_eq!(classify_topic(60.0), TopicStanding::Neutral);
        assert_eq!(classify_topic(79.99), TopicStanding::Neutral);
        assert_eq!(classify_topic(80.0), TopicStanding::Strong);
    }

    #[test]
    fn test_subject_progress_partitions_topics() {
        let tasks = vec![
            task(1, Subject::Math, "fractions", TaskStatus::Completed, &[59.9]),
            task(2, Subject::Math, "decimals", TaskStatus::Completed, &[60.0]),
            task(3, Subject::Math, "geometry", TaskStatus::Completed, &[80.0]),
            task(4, Subject::Russian, "grammar", TaskStatus::Completed, &[10.0]),
        ];
        let progress = subject_progress(Subject::Math, &tasks);
        assert_eq!(progress.total_tasks, 3);
        assert_eq!(progress.topics_covered, vec!["fractions", "decimals", "geometry"]);
        assert_eq!(progress.weak_topics, vec!["fractions"]);
        assert_eq!(progress.strong_topics, vec!["geometry"]);
        assert_eq!(progress.current_difficulty, DifficultyLevel::Easy);
    }

    #[test]
    fn test_difficulty_breakpoints() {
        assert_eq!(difficulty_for_average(85.0), DifficultyLevel::Hard);
        assert_eq!(difficulty_for_average(84.99), DifficultyLevel::Medium);
        assert_eq!(difficulty_for_average(70.0), DifficultyLevel::Medium);
        assert_eq!(difficulty_for_average(50.0), DifficultyLevel::Easy);
        assert_eq!(difficulty_for_average(49.0), DifficultyLevel::VeryEasy);
        assert_eq!(difficulty_for_average(0.0), DifficultyLevel::VeryEasy);
    }

    #[test]
    fn test_topic_without_scores_is_covered_but_unclassified() {
        let mut t = task(1, Subject::English, "verbs", TaskStatus::Active, &[]);
        t.attempts.push(attempt(5, 1, None, false));
        let progress = subject_progress(Subject::English, &[t]);
        assert_eq!(progress.topics_covered, vec!["verbs"]);
        assert!(progress.weak_topics.is_empty());
        assert!(progress.strong_topics.is_empty());
        assert_eq!(progress.average_score, 0.0);
    }

    fn goal(id: i64, status: GoalStatus) -> GoalRecord {
        GoalRecord {
            id,
            iep_id: 1,
            title: format!("goal {id}"),
            description: None,
            status,
            current_value: 0.0,
            target_value: None,
        }
    }

    #[test]
    fn test_iep_progress_absent_without_active_iep() {
        let ieps = vec![IepRecord {
            id: 1,
            student_id: 3,
            status: IepStatus::Draft,
            goals: vec![goal(1, GoalStatus::Achieved)],
        }];
        assert!(iep_progress(3, &ieps).is_none());
        assert!(iep_progress(3, &[]).is_none());
    }

    #[test]
    fn test_iep_progress_counts_goals() {
        let ieps = vec![IepRecord {
            id: 9,
            student_id: 3,
            status: IepStatus::Active,
            goals: vec![
                goal(1, GoalStatus::Achieved),
                goal(2, GoalStatus::InProgress),
                goal(3, GoalStatus::NotStarted),
                goal(4, GoalStatus::NotAchieved),
            ],
        }];
        let progress = iep_progress(3, &ieps).unwrap();
        assert_eq!(progress.iep_id, 9);
        assert_eq!(progress.total_goals, 4);
        assert_eq!(progress.achieved_goals, 1);
        assert_eq!(progress.in_progress_goals, 1);
        assert_eq!(progress.not_started_goals, 1);
        assert_eq!(progress.overall_progress, 25.0);
    }

    #[test]
    fn test_goal_progress_not_found() {
        let err = goal_progress(42, &[goal(1, GoalStatus::Achieved)], &[]).unwrap_err();
        assert!(matches!(err, AnalyticsError::NotFound(_)));
    }

    #[test]
    fn test_goal_progress_uses_linked_tasks() {
        let mut linked = task(1, Subject::Math, "fractions", TaskStatus::Completed, &[70.0, 90.0]);
        linked.iep_goal_id = Some(1);
        let unlinked = task(2, Subject::Math, "fractions", TaskStatus::Completed, &[10.0]);

        let progress = goal_progress(1, &[goal(1, GoalStatus::InProgress)], &[linked, unlinked]).unwrap();
        assert_eq!(progress.tasks_completed, 1);
        assert_eq!(progress.average_score, 80.0);
        assert_eq!(progress.target_value, 100.0);
        assert_eq!(progress.last_activity, Some(at(2, 10)));
    }

    #[test]
    fn test_goal_percent_caps_and_zero_target() {
        assert_eq!(goal_percent(5.0, 0.0), 0.0);
        assert_eq!(goal_percent(150.0, 100.0), 100.0);
        assert_eq!(goal_percent(25.0, 50.0), 50.0);
    }

    #[test]
    fn test_trend_classification() {
        assert_eq!(classify_trend(&[0, 0, 0, 0, 0, 0, 0]), Trend::Stable);
        assert_eq!(classify_trend(&[1, 1, 1, 1, 5, 5, 5]), Trend::Improving);
        assert_eq!(classify_trend(&[5, 5, 5, 5, 1, 1, 1]), Trend::Declining);
    }

    #[test]
    fn test_empty_week_recommends_more_practice() {
        let today = NaiveDate::from_ymd_opt(2024, 9, 4).unwrap();
        let report = weekly_report(1, None, today, &[]);
        assert_eq!(report.improvement_trend, Trend::Stable);
        assert_eq!(report.recommendations, vec![MSG_PRACTICE_MORE.to_string()]);
        assert_eq!(report.daily_stats.len(), 7);
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2024-09-04 is a Wednesday
        let wednesday = NaiveDate::from_ymd_opt(2024, 9, 4).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        assert_eq!(week_start_for(wednesday), monday);
        assert_eq!(week_start_for(monday), monday);
    }

    #[test]
    fn test_weekly_report_buckets_by_start_day() {
        let monday = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let mut attempts = Vec::new();
        for (day, count) in [(2u32, 1usize), (3, 1), (4, 1), (5, 1), (6, 5), (7, 5), (8, 5)] {
            for i in 0..count {
                attempts.push(AttemptRecord {
                    id: i64::from(day) * 10 + i as i64,
                    task_id: 1,
                    started_at: at(day, 9),
                    completed_at: Some(at(day, 10)),
                    score: Some(100.0),
                    is_correct: Some(true),
                    hints_used: 0,
                    time_spent: Some(60),
                });
            }
        }

        let report = weekly_report(1, Some(monday), monday, &attempts);
        assert_eq!(report.week_end, NaiveDate::from_ymd_opt(2024, 9, 8).unwrap());
        assert_eq!(report.total_tasks, 19);
        assert_eq!(report.improvement_trend, Trend::Improving);
        assert_eq!(report.recommendations, vec![MSG_KEEP_GOING.to_string()]);
        assert_eq!(report.daily_stats[4].time_spent, 300);
    }

    #[test]
    fn test_declining_and_low_activity_co_occur() {
        let recs = weekly_recommendations(1.0, Trend::Declining);
        assert_eq!(recs, vec![MSG_PRACTICE_MORE.to_string(), MSG_RESTART_EASY.to_string()]);
    }

    #[test]
    fn test_submit_is_one_way() {
        let fresh = attempt(1, 1, None, false);
        let done = fresh.submit(at(2, 9) + Duration::seconds(90), None, Some(true), None).unwrap();
        assert_eq!(done.score, Some(100.0));
        assert_eq!(done.time_spent, Some(90));

        let again = done.submit(at(3, 9), Some(10.0), Some(false), None);
        assert!(matches!(again, Err(AnalyticsError::Validation(_))));
    }

    #[test]
    fn test_submit_incorrect_and_ungraded() {
        let wrong = attempt(1, 1, None, false)
            .submit(at(2, 10), None, Some(false), Some(40))
            .unwrap();
        assert_eq!(wrong.score, Some(0.0));
        assert_eq!(wrong.time_spent, Some(40));

        let ungraded = attempt(2, 1, None, false)
            .submit(at(2, 10), None, None, None)
            .unwrap();
        assert!(ungraded.is_completed());
        assert_eq!(ungraded.score, None);
    }
}
