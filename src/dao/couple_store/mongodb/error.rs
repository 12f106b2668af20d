use mongodb::error::{
    Error as MongoError, ErrorKind, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT,
    WriteFailure,
};
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Server error code raised when an insert collides with an existing `_id`.
const DUPLICATE_KEY: i32 = 11000;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Rejected connection string.
        uri: String,
        /// Driver parse error.
        #[source]
        source: MongoError,
    },
    /// The driver refused the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the connection handshake.
    #[error("MongoDB did not answer `hello` after {attempts} attempt(s)")]
    Handshake {
        /// Handshakes sent before giving up.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// The server is neither a replica set member nor a `mongos` router.
    #[error("MongoDB deployment behind `{database}` is standalone and cannot run transactions")]
    TransactionsUnsupported {
        /// Database the store was asked to use.
        database: String,
    },
    /// A periodic health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An index could not be created at startup.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Indexed collection.
        collection: &'static str,
        /// Indexed keys.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A client session or its transaction could not be started.
    #[error("failed to open a MongoDB transaction")]
    StartTransaction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// `commitTransaction` failed; its labels tell whether anything was applied.
    #[error("failed to commit MongoDB transaction")]
    Commit {
        /// Driver error carrying the transaction labels.
        #[source]
        source: MongoError,
    },
    /// A single document read failed.
    #[error("failed to load `{id}` from `{collection}`")]
    Load {
        /// Source collection.
        collection: &'static str,
        /// Requested `_id`.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A document write failed.
    #[error("failed to save `{id}` into `{collection}`")]
    Save {
        /// Target collection.
        collection: &'static str,
        /// Written `_id`.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A multi-document query failed.
    #[error("failed to query `{collection}`")]
    Query {
        /// Queried collection.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}

impl MongoDaoError {
    /// Driver error wrapped by this failure, if any.
    fn driver_error(&self) -> Option<&MongoError> {
        match self {
            MongoDaoError::InvalidUri { source, .. }
            | MongoDaoError::ClientConstruction { source }
            | MongoDaoError::Handshake { source, .. }
            | MongoDaoError::HealthPing { source }
            | MongoDaoError::EnsureIndex { source, .. }
            | MongoDaoError::StartTransaction { source }
            | MongoDaoError::Commit { source }
            | MongoDaoError::Load { source, .. }
            | MongoDaoError::Save { source, .. }
            | MongoDaoError::Query { source, .. } => Some(source),
            MongoDaoError::TransactionsUnsupported { .. } => None,
        }
    }

    /// Whether the server aborted the transaction, so running it again from the start is safe.
    pub fn is_transaction_conflict(&self) -> bool {
        self.driver_error()
            .is_some_and(|err| err.contains_label(TRANSIENT_TRANSACTION_ERROR))
    }

    /// Whether a commit was sent without learning if it was applied.
    pub fn is_commit_outcome_unknown(&self) -> bool {
        matches!(self, MongoDaoError::Commit { source } if is_unknown_commit_result(source))
    }
}

/// Whether the driver asks for `commitTransaction` alone to be sent again.
pub fn is_unknown_commit_result(err: &MongoError) -> bool {
    err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
}

/// Whether an insert failed only because the key is already taken.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        if err.is_commit_outcome_unknown() {
            StorageError::commit_outcome_unknown(err.to_string())
        } else if err.is_transaction_conflict() {
            StorageError::conflict(err.to_string())
        } else {
            StorageError::unavailable(err.to_string(), err)
        }
    }
}
