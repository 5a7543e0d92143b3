//! Error types for aqua-insights crate.

use aqua_growth::GrowthError;
use aqua_store::StoreError;
use thiserror::Error;

/// Errors from the insight engine.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("growth model error: {0}")]
    Growth(#[from] GrowthError),

    #[error("malformed document {collection}/{key}: {message}")]
    Malformed {
        collection: String,
        key: String,
        message: String,
    },
}

impl From<serde_json::Error> for InsightError {
    fn from(err: serde_json::Error) -> Self {
        InsightError::Store(StoreError::Serialization(err))
    }
}

/// Result type for insight operations.
pub type Result<T> = std::result::Result<T, InsightError>;
