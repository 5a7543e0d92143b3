//! Validation errors surfaced synchronously at the write boundary.
//!
//! Input is never silently clamped when it is written; it is rejected with
//! one of these so the caller can show it inline.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("mortality rate {rate}% is outside 0-100")]
    RateOutOfRange { rate: f64 },

    #[error("cumulative mortality would reach {would_be:.2}% (currently {cumulative:.2}%), above 100%")]
    CumulativeOverflow { cumulative: f64, would_be: f64 },

    #[error("only {days_since_last} days since the last entry; next entry allowed on {next_allowed} ({cadence_days}-day cadence)")]
    CadenceViolation {
        days_since_last: i64,
        cadence_days: u32,
        next_allowed: NaiveDate,
    },

    #[error("weight must be positive, got {0} g")]
    NonPositiveWeight(f64),

    #[error("amount must be positive, got {0} kg")]
    NonPositiveAmount(f64),

    #[error("snooze duration must be positive and within the timestamp range, got {0} h")]
    InvalidSnoozeDuration(f64),
}
