//! Data Sanitization
//!
//! Numeric guards used by the aggregations.
//!
//! Functions:
//! - Score clamping (drops NaN/Inf)
//! - Zero-safe ratios and means
//! - Two-decimal rounding for reported values

/// Lowest and highest valid attempt score
pub const SCORE_RANGE: (f64, f64) = (0.0, 100.0);

/// Clamp a score to the 0-100 range; non-finite values are discarded.
pub fn sanitize_score(score: f64) -> Option<f64> {
    if score.is_finite() {
        Some(score.clamp(SCORE_RANGE.0, SCORE_RANGE.1))
    } else {
        None
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Percentage `part / total * 100`, 0 for an empty total.
pub fn percent(part: usize, total: usize) -> f64 {
    safe_ratio(part as f64, total as f64) * 100.0
}

/// Arithmetic mean, 0 for an empty input.
pub fn mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    safe_ratio(sum, count as f64)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
