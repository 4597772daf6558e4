//! Composite student analytics and batch summaries.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::progress::{
    iep_progress, subject_progress, summarize, IepProgress, IepRecord, ProgressSummary,
    SubjectProgress, TaskRecord, STRONG_TOPIC_THRESHOLD, WEAK_TOPIC_THRESHOLD,
};
use crate::types::{ScaffoldingLevel, Subject};

const MAX_HIGHLIGHTS: usize = 5;
const TOPICS_PER_SUBJECT: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAnalytics {
    pub student_id: i64,
    pub progress_summary: ProgressSummary,
    pub subjects_progress: Vec<SubjectProgress>,
    pub iep_progress: Option<IepProgress>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub recommended_topics: Vec<String>,
    pub scaffolding_recommendation: ScaffoldingLevel,
}

/// Suggested scaffolding from the overall average score.
pub fn recommend_scaffolding(average_score: f64) -> ScaffoldingLevel {
    if average_score >= 85.0 {
        ScaffoldingLevel::LowSupport
    } else if average_score < 50.0 {
        ScaffoldingLevel::HighSupport
    } else {
        ScaffoldingLevel::MediumSupport
    }
}

pub fn student_analytics(student_id: i64, tasks: &[TaskRecord], ieps: &[IepRecord]) -> StudentAnalytics {
    let progress_summary = summarize(student_id, tasks);

    let subjects_progress: Vec<SubjectProgress> = Subject::ALL
        .into_iter()
        .map(|subject| subject_progress(subject, tasks))
        .filter(|p| p.total_tasks > 0)
        .collect();

    let mut strengths = Vec::new();
    let mut areas_for_improvement = Vec::new();
    let mut recommended_topics = Vec::new();

    for sp in &subjects_progress {
        let name = sp.subject.display_name();
        if sp.average_score >= STRONG_TOPIC_THRESHOLD {
            strengths.push(format!("{name}: excellent results"));
        } else if sp.average_score < WEAK_TOPIC_THRESHOLD {
            areas_for_improvement.push(format!("{name}: needs practice"));
        }

        strengths.extend(sp.strong_topics.iter().take(TOPICS_PER_SUBJECT).map(|t| format!("Topic: {t}")));
        areas_for_improvement.extend(sp.weak_topics.iter().take(TOPICS_PER_SUBJECT).map(|t| format!("Topic: {t}")));
        recommended_topics.extend(sp.weak_topics.first().cloned());
    }

    strengths.truncate(MAX_HIGHLIGHTS);
    areas_for_improvement.truncate(MAX_HIGHLIGHTS);
    recommended_topics.truncate(MAX_HIGHLIGHTS);

    StudentAnalytics {
        student_id,
        scaffolding_recommendation: recommend_scaffolding(progress_summary.average_score),
        iep_progress: iep_progress(student_id, ieps),
        progress_summary,
        subjects_progress,
        strengths,
        areas_for_improvement,
        recommended_topics,
    }
}

/// Summaries for many students, computed in parallel. Output order follows input.
pub fn summarize_many(histories: &[(i64, Vec<TaskRecord>)]) -> Vec<ProgressSummary> {
    histories
        .par_iter()
        .map(|(student_id, tasks)| summarize(*student_id, tasks))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::AttemptRecord;
    use crate::types::{DifficultyLevel, TaskStatus};
    use chrono::{TimeZone, Utc};

    fn scored_task(id: i64, subject: Subject, topic: &str, score: f64) -> TaskRecord {
        let when = Utc.with_ymd_and_hms(2024, 9, 2, 10, 0, 0).unwrap();
        TaskRecord {
            id,
            subject,
            topic: topic.to_string(),
            difficulty: DifficultyLevel::Medium,
            status: TaskStatus::Completed,
            iep_goal_id: None,
            attempts: vec![AttemptRecord {
                id,
                task_id: id,
                started_at: when,
                completed_at: Some(when),
                score: Some(score),
                is_correct: Some(score >= 50.0),
                hints_used: 0,
                time_spent: Some(30),
            }],
        }
    }

    #[test]
    fn test_scaffolding_recommendation_tiers() {
        assert_eq!(recommend_scaffolding(85.0), ScaffoldingLevel::LowSupport);
        assert_eq!(recommend_scaffolding(70.0), ScaffoldingLevel::MediumSupport);
        assert_eq!(recommend_scaffolding(49.9), ScaffoldingLevel::HighSupport);
    }

    #[test]
    fn test_empty_student() {
        let analytics = student_analytics(5, &[], &[]);
        assert!(analytics.subjects_progress.is_empty());
        assert!(analytics.iep_progress.is_none());
        assert_eq!(analytics.scaffolding_recommendation, ScaffoldingLevel::HighSupport);
    }

    #[test]
    fn test_strengths_and_areas() {
        let tasks = vec![
            scored_task(1, Subject::Math, "fractions", 30.0),
            scored_task(2, Subject::Math, "decimals", 40.0),
            scored_task(3, Subject::Math, "shapes", 45.0),
            scored_task(4, Subject::Russian, "grammar", 95.0),
        ];
        let analytics = student_analytics(1, &tasks, &[]);

        assert_eq!(analytics.subjects_progress.len(), 2);
        assert_eq!(analytics.subjects_progress[0].subject, Subject::Russian);
        assert_eq!(
            analytics.strengths,
            vec!["Russian language: excellent results", "Topic: grammar"]
        );
        assert_eq!(
            analytics.areas_for_improvement,
            vec!["Mathematics: needs practice", "Topic: fractions", "Topic: decimals"]
        );
        assert_eq!(analytics.recommended_topics, vec!["fractions"]);
    }

    #[test]
    fn test_summarize_many_preserves_order() {
        let histories = vec![
            (1, vec![scored_task(1, Subject::Math, "a", 100.0)]),
            (2, Vec::new()),
            (3, vec![scored_task(2, Subject::Math, "a", 50.0)]),
        ];
        let summaries = summarize_many(&histories);
        let ids: Vec<i64> = summaries.iter().map(|s| s.student_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(summaries[0].average_score, 100.0);
        assert_eq!(summaries[1].total_tasks, 0);
    }
}
