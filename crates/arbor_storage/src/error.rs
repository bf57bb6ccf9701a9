//! Error types for backend operations.

use thiserror::Error;

/// Result type for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while talking to a backend.
///
/// Compare failures of a conditional transaction are not errors; they are
/// reported as [`crate::TxnOutcome::Conflict`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The backend could not be reached or did not answer.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend returned data that violates its own contract.
    #[error("backend corrupted: {0}")]
    Corrupted(String),

    /// The backend has been closed.
    #[error("backend is closed")]
    Closed,
}

impl StorageError {
    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Returns true for transport failures that leave the backend unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
