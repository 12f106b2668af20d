use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::UserId;
use crate::dto::validation::validate_anniversary;

/// Freshly issued invite.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateInviteResult {
    /// Six-symbol code to share with the partner.
    pub code: String,
    /// RFC 3339 instant after which the code is refused.
    pub expires_at: String,
}

/// Outcome of the advisory pre-check of an invite code.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateCodeResult {
    /// User id of the inviter.
    pub inviter_uid: UserId,
    /// Display name of the inviter.
    pub inviter_name: String,
}

/// Body of the acceptance call.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AcceptInviteRequest {
    /// Relationship anniversary written `DD/MM/YYYY`.
    #[validate(custom(function = "validate_anniversary"))]
    pub anniversary: String,
}

/// Relationship created by a committed acceptance.
#[derive(Debug, Serialize, ToSchema)]
pub struct AcceptInviteResult {
    /// Relationship identifier.
    pub couple_id: Uuid,
    /// ISO calendar date.
    pub anniversary: String,
}
