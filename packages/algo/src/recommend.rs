//! Task recommendation ranking
//!
//! Proposals come from per-subject progress:
//! - the first two weak topics at EASY, priority 10 then 9
//! - the first strong topic one tier above the current level, priority 5,
//!   once the subject has completed work averaging at least 70
//!
//! Proposals from all subjects are merged and stably sorted by priority.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::progress::{subject_progress, SubjectProgress, TaskRecord};
use crate::types::{DifficultyLevel, Subject};

pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 5;
pub const MAX_RECOMMENDATION_LIMIT: usize = 20;

const WEAK_TOPICS_PER_SUBJECT: usize = 2;
const WEAK_TOPIC_TOP_PRIORITY: u8 = 10;
const WEAK_TOPIC_MINUTES: u32 = 10;

const ADVANCE_PRIORITY: u8 = 5;
const ADVANCE_MIN_AVERAGE: f64 = 70.0;
const ADVANCE_MINUTES: u32 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecommendation {
    pub subject: Subject,
    pub topic: String,
    pub difficulty: DifficultyLevel,
    pub reason: String,
    pub priority: u8,
    /// Minutes
    pub estimated_time: u32,
}

pub fn validate_limit(limit: usize) -> AnalyticsResult<usize> {
    if (1..=MAX_RECOMMENDATION_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(AnalyticsError::Validation(format!(
            "limit must be between 1 and {MAX_RECOMMENDATION_LIMIT}, got {limit}"
        )))
    }
}

fn proposals_for(progress: &SubjectProgress) -> Vec<TaskRecommendation> {
    let mut proposals: Vec<TaskRecommendation> = progress
        .weak_topics
        .iter()
        .take(WEAK_TOPICS_PER_SUBJECT)
        .zip(0u8..)
        .map(|(topic, i)| TaskRecommendation {
            subject: progress.subject,
            topic: topic.clone(),
            difficulty: DifficultyLevel::Easy,
            reason: format!("needs more practice in topic {topic}"),
            priority: WEAK_TOPIC_TOP_PRIORITY - i,
            estimated_time: WEAK_TOPIC_MINUTES,
        })
        .collect();

    if progress.completed_tasks > 0 && progress.average_score >= ADVANCE_MIN_AVERAGE {
        if let Some(topic) = progress.strong_topics.first() {
            proposals.push(TaskRecommendation {
                subject: progress.subject,
                topic: topic.clone(),
                difficulty: progress.current_difficulty.harder(),
                reason: format!("ready for harder tasks in topic {topic}"),
                priority: ADVANCE_PRIORITY,
                estimated_time: ADVANCE_MINUTES,
            });
        }
    }

    proposals
}

/// Merge proposals across subjects, highest priority first.
///
/// Ties keep subject order, then rule order within a subject.
pub fn rank_recommendations(
    progress: &[SubjectProgress],
    limit: usize,
) -> AnalyticsResult<Vec<TaskRecommendation>> {
    let limit = validate_limit(limit)?;

    let mut ranked: Vec<TaskRecommendation> = progress.iter().flat_map(proposals_for).collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.priority.cmp(&a.priority));
    ranked.truncate(limit);
    Ok(ranked)
}

/// Recommendations straight from task history, for one subject or all of them.
pub fn recommend_tasks(
    tasks: &[TaskRecord],
    subject: Option<Subject>,
    limit: usize,
) -> AnalyticsResult<Vec<TaskRecommendation>> {
    let subjects: Vec<Subject> = match subject {
        Some(s) => vec![s],
        None => Subject::ALL.to_vec(),
    };
    let progress: Vec<SubjectProgress> = subjects
        .into_iter()
        .map(|s| subject_progress(s, tasks))
        .collect();
    rank_recommendations(&progress, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(
        subject: Subject,
        completed: usize,
        average: f64,
        current: DifficultyLevel,
        weak: &[&str],
        strong: &[&str],
    ) -> SubjectProgress {
        SubjectProgress {
            subject,
            total_tasks: completed.max(1),
            completed_tasks: completed,
            average_score: average,
            current_difficulty: current,
            topics_covered: weak.iter().chain(strong).map(|t| t.to_string()).collect(),
            weak_topics: weak.iter().map(|t| t.to_string()).collect(),
            strong_topics: strong.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_weak_math_and_strong_russian_ranking() {
        let input = vec![
            progress(Subject::Russian, 3, 75.0, DifficultyLevel::Medium, &[], &["grammar"]),
            progress(Subject::Math, 2, 40.0, DifficultyLevel::VeryEasy, &["fractions", "decimals"], &[]),
        ];
        let ranked = rank_recommendations(&input, 3).unwrap();

        let topics: Vec<(&str, u8)> = ranked.iter().map(|r| (r.topic.as_str(), r.priority)).collect();
        assert_eq!(topics, vec![("fractions", 10), ("decimals", 9), ("grammar", 5)]);
        assert_eq!(ranked[0].difficulty, DifficultyLevel::Easy);
        assert_eq!(ranked[2].difficulty, DifficultyLevel::Hard);
        assert_eq!(ranked[2].estimated_time, 15);
    }

    #[test]
    fn test_only_first_two_weak_topics() {
        let input = vec![progress(Subject::Math, 1, 30.0, DifficultyLevel::VeryEasy, &["a", "b", "c"], &[])];
        let ranked = rank_recommendations(&input, 10).unwrap();
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_no_advance_without_completed_work() {
        let input = vec![progress(Subject::Reading, 0, 90.0, DifficultyLevel::Hard, &[], &["poems"])];
        assert!(rank_recommendations(&input, 5).unwrap().is_empty());

        let input = vec![progress(Subject::Reading, 2, 69.0, DifficultyLevel::Easy, &[], &["poems"])];
        assert!(rank_recommendations(&input, 5).unwrap().is_empty());
    }

    #[test]
    fn test_advance_saturates_at_very_hard() {
        let input = vec![progress(Subject::English, 4, 99.0, DifficultyLevel::VeryHard, &[], &["verbs"])];
        let ranked = rank_recommendations(&input, 5).unwrap();
        assert_eq!(ranked[0].difficulty, DifficultyLevel::VeryHard);
    }

    #[test]
    fn test_ties_keep_subject_order() {
        let input = vec![
            progress(Subject::Russian, 1, 40.0, DifficultyLevel::VeryEasy, &["spelling"], &[]),
            progress(Subject::Math, 1, 40.0, DifficultyLevel::VeryEasy, &["fractions"], &[]),
        ];
        let ranked = rank_recommendations(&input, 5).unwrap();
        assert_eq!(ranked[0].topic, "spelling");
        assert_eq!(ranked[1].topic, "fractions");
    }

    #[test]
    fn test_truncates_to_limit() {
        let input = vec![
            progress(Subject::Russian, 1, 40.0, DifficultyLevel::VeryEasy, &["a", "b"], &[]),
            progress(Subject::Math, 1, 40.0, DifficultyLevel::VeryEasy, &["c", "d"], &[]),
        ];
        assert_eq!(rank_recommendations(&input, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_limit_bounds() {
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(21).is_err());
        assert_eq!(validate_limit(20), Ok(20));
    }

    #[test]
    fn test_empty_history_has_no_recommendations() {
        let ranked = recommend_tasks(&[], None, DEFAULT_RECOMMENDATION_LIMIT).unwrap();
        assert!(ranked.is_empty());
    }
}
