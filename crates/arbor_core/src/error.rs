//! Error types for Arbor core.

use crate::types::{CommitPhase, SizeLimit};
use arbor_codec::Path;
use arbor_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Arbor core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Backend error that is not a transport failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// CBOR codec or key encoding error.
    #[error("codec error: {0}")]
    Codec(#[from] arbor_codec::CodecError),

    /// Operation not permitted in the current transaction or cohort state.
    ///
    /// The state is left unchanged.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the operation is not allowed.
        message: String,
    },

    /// A read could not be served.
    ///
    /// The transaction stays usable.
    #[error("read of {path} failed: {reason}")]
    ReadFailed {
        /// The path being read.
        path: Path,
        /// Why the read failed.
        reason: String,
    },

    /// Another writer changed data this transaction depends on.
    #[error("conflict detected during {phase} on {key}")]
    ConflictDetected {
        /// The phase that detected the conflict.
        phase: CommitPhase,
        /// The conflicting key, rendered as a path where possible.
        key: String,
    },

    /// The backend could not be reached.
    #[error("backend unavailable: {message}")]
    BackendUnavailable {
        /// Description of the transport failure.
        message: String,
    },

    /// The staged request exceeds a configured limit.
    #[error("transaction too large: {actual} {kind} exceeds limit of {limit}")]
    TransactionTooLarge {
        /// Which limit was exceeded.
        kind: SizeLimit,
        /// Size of the staged request.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl CoreError {
    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a read failed error.
    pub fn read_failed(path: &Path, reason: impl ToString) -> Self {
        Self::ReadFailed {
            path: path.clone(),
            reason: reason.to_string(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(phase: CommitPhase, key: impl Into<String>) -> Self {
        Self::ConflictDetected {
            phase,
            key: key.into(),
        }
    }

    /// Creates a backend unavailable error.
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    /// Converts a backend error raised during a commit phase.
    ///
    /// Transport failures become [`CoreError::BackendUnavailable`].
    pub fn from_backend(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(message) => Self::BackendUnavailable { message },
            other => Self::Storage(other),
        }
    }

    /// Returns true for conflicts found before anything was staged.
    ///
    /// Such a transaction can be rebuilt and tried again. A conflict in the
    /// commit phase means the staged request was rejected by the backend.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConflictDetected {
                phase: CommitPhase::CanCommit,
                ..
            }
        )
    }

    /// Returns true for any conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConflictDetected { .. })
    }
}
