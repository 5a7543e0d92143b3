//! Error types for aqua-store crate.

use aqua_types::ValidationError;
use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend cannot be reached right now; callers may retry later.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend failed the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A checked write was rejected by its admission check.
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    /// Document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the failure is transient (worth letting the next tick retry).
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
