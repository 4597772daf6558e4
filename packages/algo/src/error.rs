use thiserror::Error;

/// The only failure kinds the analytics can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyticsError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
