use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{ProfileEntity, UserId},
    dto::{format_system_time, validation::validate_display_name},
};

/// Request creating or renaming the caller's profile.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpsertProfileRequest {
    /// Name shown to the partner, 1 to 50 characters once trimmed.
    #[validate(custom(function = "validate_display_name"))]
    pub display_name: String,
}

/// Pairing-relevant projection of a profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileView {
    /// User id forwarded by the gateway.
    pub id: UserId,
    /// Name shown to the partner.
    pub display_name: String,
    /// Relationship the user belongs to, once paired.
    pub couple_id: Option<Uuid>,
    /// RFC 3339 instant of the pairing.
    pub paired_at: Option<String>,
    /// RFC 3339 instant the profile was first stored.
    pub created_at: String,
}

impl From<ProfileEntity> for ProfileView {
    fn from(value: ProfileEntity) -> Self {
        Self {
            id: value.id,
            display_name: value.display_name,
            couple_id: value.couple_id,
            paired_at: value.paired_at.map(format_system_time),
            created_at: format_system_time(value.created_at),
        }
    }
}
