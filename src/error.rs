use std::fmt;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Which side of a pairing attempt is already linked to a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairedParty {
    /// The caller asking to pair.
    Requester,
    /// The profile that issued the invite.
    Inviter,
}

impl fmt::Display for PairedParty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairedParty::Requester => f.write_str("you are"),
            PairedParty::Inviter => f.write_str("the inviter is"),
        }
    }
}

/// Terminal, user-facing reasons an invite cannot be validated or accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    /// No verified user id came with the request.
    #[error("sign in to use an invite code")]
    NotAuthenticated,
    /// The code is not six symbols of `[A-Z0-9]` after normalization.
    #[error("invite codes are 6 letters or digits")]
    InvalidCodeFormat,
    /// One side already belongs to a relationship.
    #[error("{0} already paired")]
    AlreadyPaired(PairedParty),
    /// No invite was issued under this code.
    #[error("invite code not found")]
    CodeNotFound,
    /// The invite outlived its time to live.
    #[error("invite code has expired")]
    CodeExpired,
    /// Someone already paired through this invite.
    #[error("invite code was already used")]
    CodeAlreadyUsed,
    /// The inviter tried to accept their own code.
    #[error("you cannot accept your own invite")]
    SelfInvite,
    /// The inviter's profile is gone.
    #[error("the inviter no longer exists")]
    InviterMissing,
}

impl PairingError {
    /// Machine-readable reason code carried in error responses.
    pub fn reason(&self) -> &'static str {
        match self {
            PairingError::NotAuthenticated => "not_authenticated",
            PairingError::InvalidCodeFormat => "invalid_code_format",
            PairingError::AlreadyPaired(PairedParty::Requester) => "already_paired",
            PairingError::AlreadyPaired(PairedParty::Inviter) => "inviter_already_paired",
            PairingError::CodeNotFound => "code_not_found",
            PairingError::CodeExpired => "code_expired",
            PairingError::CodeAlreadyUsed => "code_already_used",
            PairingError::SelfInvite => "self_invite",
            PairingError::InviterMissing => "inviter_missing",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            PairingError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            PairingError::InvalidCodeFormat => StatusCode::BAD_REQUEST,
            PairingError::CodeNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::CONFLICT,
        }
    }
}

/// Failures of the game-session engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// No verified user id came with the request.
    #[error("sign in to play")]
    NotAuthenticated,
    /// The caller has no relationship yet.
    #[error("pair with your partner first")]
    NotPaired,
    /// The profile points at a relationship that does not exist.
    #[error("relationship not found")]
    RelationshipNotFound,
    /// No session with this id.
    #[error("session not found")]
    SessionNotFound,
    /// The caller is not one of the session's two members.
    #[error("only members of the relationship can answer")]
    NotAMember,
    /// The answer does not fit the session's game type.
    #[error("invalid answer: {0}")]
    InvalidAnswer(String),
}

impl GameError {
    /// Machine-readable reason code carried in error responses.
    pub fn reason(&self) -> &'static str {
        match self {
            GameError::NotAuthenticated => "not_authenticated",
            GameError::NotPaired => "not_paired",
            GameError::RelationshipNotFound => "relationship_not_found",
            GameError::SessionNotFound => "session_not_found",
            GameError::NotAMember => "not_a_member",
            GameError::InvalidAnswer(_) => "invalid_answer",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            GameError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            GameError::RelationshipNotFound | GameError::SessionNotFound => StatusCode::NOT_FOUND,
            GameError::InvalidAnswer(_) => StatusCode::BAD_REQUEST,
            GameError::NotPaired | GameError::NotAMember => StatusCode::CONFLICT,
        }
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invite validation or acceptance refused.
    #[error(transparent)]
    Pairing(#[from] PairingError),
    /// Session rules refused the call.
    #[error(transparent)]
    Game(#[from] GameError),
    /// A concurrent commit won the race and the retry budget is spent.
    #[error("concurrent update detected; please retry")]
    Conflict,
    /// The commit was sent but its result is unknown; it may have been applied.
    #[error("update outcome unknown; reload before retrying")]
    OutcomeUnknown,
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// A bounded allocation loop gave up.
    #[error("exhausted: {0}")]
    Exhausted(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { .. } => ServiceError::Conflict,
            StorageError::CommitOutcomeUnknown { .. } => ServiceError::OutcomeUnknown,
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Domain rule violation reported with its reason code.
    #[error("{message}")]
    Rejected {
        /// HTTP status of the response.
        status: StatusCode,
        /// Machine-readable reason code.
        reason: &'static str,
        /// Human-readable explanation.
        message: String,
    },
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Pairing(err) => AppError::Rejected {
                status: err.status(),
                reason: err.reason(),
                message: err.to_string(),
            },
            ServiceError::Game(err) => AppError::Rejected {
                status: err.status(),
                reason: err.reason(),
                message: err.to_string(),
            },
            ServiceError::Conflict => AppError::Rejected {
                status: StatusCode::CONFLICT,
                reason: "conflict",
                message: ServiceError::Conflict.to_string(),
            },
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::OutcomeUnknown => {
                AppError::ServiceUnavailable(ServiceError::OutcomeUnknown.to_string())
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Exhausted(message) => AppError::ServiceUnavailable(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, reason) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            AppError::Rejected { status, reason, .. } => (*status, Some(*reason)),
            AppError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
            reason,
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(err: ServiceError) -> (StatusCode, &'static str) {
        match AppError::from(err) {
            AppError::Rejected { status, reason, .. } => (status, reason),
            other => panic!("expected a rejection, got {other:?}"),
        }
    }

    #[test]
    fn pairing_failures_keep_their_reason_code() {
        assert_eq!(
            rejected(PairingError::CodeAlreadyUsed.into()),
            (StatusCode::CONFLICT, "code_already_used")
        );
        assert_eq!(
            rejected(PairingError::AlreadyPaired(PairedParty::Inviter).into()),
            (StatusCode::CONFLICT, "inviter_already_paired")
        );
        assert_eq!(
            rejected(PairingError::NotAuthenticated.into()),
            (StatusCode::UNAUTHORIZED, "not_authenticated")
        );
        assert_eq!(
            rejected(PairingError::InvalidCodeFormat.into()),
            (StatusCode::BAD_REQUEST, "invalid_code_format")
        );
    }

    #[test]
    fn conflicts_are_distinct_from_preconditions() {
        let err: ServiceError = StorageError::conflict("profile moved").into();
        assert!(matches!(err, ServiceError::Conflict));
        assert_eq!(rejected(err), (StatusCode::CONFLICT, "conflict"));
    }

    #[test]
    fn unknown_commit_outcome_is_not_a_conflict() {
        let err: ServiceError = StorageError::commit_outcome_unknown("no reply").into();
        assert!(matches!(err, ServiceError::OutcomeUnknown));
        assert!(matches!(
            AppError::from(err),
            AppError::ServiceUnavailable(_)
        ));
    }

    #[test]
    fn game_lookups_map_to_not_found() {
        assert_eq!(
            rejected(GameError::SessionNotFound.into()),
            (StatusCode::NOT_FOUND, "session_not_found")
        );
    }
}
