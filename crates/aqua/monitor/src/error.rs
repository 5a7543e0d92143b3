//! Error types for aqua-monitor crate.

use aqua_growth::GrowthError;
use aqua_insights::InsightError;
use aqua_store::StoreError;
use aqua_types::{EntryId, PondId, ValidationError};
use thiserror::Error;

/// Errors surfaced to collaborators of the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Input rejected at the write boundary. Never clamped silently.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("pond not found: {0}")]
    PondNotFound(PondId),

    #[error("entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("insight error: {0}")]
    Insight(#[from] InsightError),

    #[error("growth model error: {0}")]
    Growth(#[from] GrowthError),
}

impl From<StoreError> for MonitorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(validation) => MonitorError::Validation(validation),
            other => MonitorError::Store(other),
        }
    }
}

impl MonitorError {
    /// Whether retrying on a later tick may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            MonitorError::Store(e) => e.is_transient(),
            MonitorError::Insight(InsightError::Store(e)) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_write_maps_to_validation() {
        let err: MonitorError = StoreError::Rejected(ValidationError::RateOutOfRange { rate: 120.0 }).into();
        assert!(matches!(err, MonitorError::Validation(_)));

        let outage: MonitorError = StoreError::Unavailable("down".into()).into();
        assert!(outage.is_transient());
    }
}
