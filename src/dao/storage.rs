use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What was being attempted.
        message: String,
        /// Backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A concurrent commit touched a document this transaction depends on.
    #[error("transaction conflict: {message}")]
    Conflict {
        /// Which document lost the race.
        message: String,
    },
    /// The commit may or may not have been applied; the work must not run again.
    #[error("transaction outcome unknown: {message}")]
    CommitOutcomeUnknown {
        /// Backend report of the failed commit.
        message: String,
    },
    /// A stored document could not be mapped back onto its entity.
    #[error("corrupt document `{id}`: {reason}")]
    Corrupt {
        /// Key of the offending document.
        id: String,
        /// Why it could not be decoded.
        reason: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a conflict error describing which document lost the race.
    pub fn conflict(message: impl Into<String>) -> Self {
        StorageError::Conflict {
            message: message.into(),
        }
    }

    /// Construct an error for a commit whose result never came back.
    pub fn commit_outcome_unknown(message: impl Into<String>) -> Self {
        StorageError::CommitOutcomeUnknown {
            message: message.into(),
        }
    }

    /// Whether retrying the whole transaction may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}
