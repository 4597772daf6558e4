//! # adaptive-algo - adaptive learning core
//!
//! Pure, synchronous computations behind the adaptive-learning backend:
//!
//! - **Adaptation engine** - merges accessibility accommodations for a
//!   student's disability profile, learning style and scaffolding level
//! - **Progress analytics** - summaries, per-subject standing, IEP goal
//!   progress and weekly trend reports
//! - **Recommendations** - ranked next-task proposals from weak and strong topics
//!
//! ## Modules
//!
//! - [`types`] - closed-set tags, ordinal levels, interface settings
//! - [`adaptation`] - rule table and plan fold
//! - [`progress`] - task/attempt records and aggregates
//! - [`recommend`] - recommendation ranking
//! - [`analytics`] - composite student analytics, parallel batch summaries
//! - [`sanitize`] - score clamping and zero-safe arithmetic
//! - [`error`] - failure kinds
//!
//! ## Example
//!
//! ```rust
//! use adaptive_algo::{compute_adaptations, LearningStyle, ScaffoldingLevel};
//!
//! let plan = compute_adaptations(
//!     &["dyslexia", "adhd"],
//!     Some(LearningStyle::Visual),
//!     Some(ScaffoldingLevel::HighSupport),
//!     None,
//! );
//! assert_eq!(plan.font_size, 18);
//! assert_eq!(plan.extra_time, 30);
//! assert_eq!(plan.scaffolding_level, 2);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod adaptation;
pub mod analytics;
pub mod error;
pub mod progress;
pub mod recommend;
pub mod sanitize;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use error::{AnalyticsError, AnalyticsResult};

pub use adaptation::{compute_adaptations, compute_for_categories, AdaptationPlan, AdaptationRule};

pub use progress::{
    classify_trend, daily_stats, goal_progress, iep_progress, subject_progress, summarize,
    week_start_for, weekly_report, AttemptRecord, DailyStats, GoalProgress, GoalRecord,
    IepProgress, IepRecord, ProgressSummary, SubjectProgress, TaskRecord, Trend, WeeklyReport,
};

pub use recommend::{rank_recommendations, recommend_tasks, TaskRecommendation};

pub use analytics::{student_analytics, summarize_many, StudentAnalytics};
