//! Error types for aqua-growth crate.

use thiserror::Error;

/// Errors raised while building growth models.
#[derive(Debug, Error)]
pub enum GrowthError {
    /// The stage table is empty, unordered, or not unbounded at the top.
    #[error("invalid growth stage table: {0}")]
    InvalidStageTable(String),

    /// Cadence must be at least one day.
    #[error("invalid cadence: {0} days")]
    InvalidCadence(u32),
}

/// Result type for growth operations.
pub type Result<T> = std::result::Result<T, GrowthError>;
