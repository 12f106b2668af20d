use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{CoupleEntity, UserId};
use crate::dto::format_system_time;

/// Relationship as seen by one of its members, counters reset for today.
#[derive(Debug, Serialize, ToSchema)]
pub struct CoupleView {
    /// Relationship identifier.
    pub id: Uuid,
    /// Inviter first, then the accepting partner.
    pub members: [UserId; 2],
    /// The viewer's partner.
    pub partner_id: Option<UserId>,
    /// RFC 3339 pairing instant.
    pub created_at: String,
    /// ISO calendar date.
    pub anniversary: String,
    /// Daily questions left today.
    pub daily_remaining: u32,
    /// Tickets left today for the other games.
    pub tickets_remaining: u32,
    /// Consecutive days with a completed daily question.
    pub streak: u32,
    /// ISO calendar date the counters were last restored.
    pub last_reset_date: String,
}

impl CoupleView {
    /// Project `couple` for the member `viewer`.
    pub fn new(couple: CoupleEntity, viewer: &str) -> Self {
        Self {
            partner_id: couple.partner_of(viewer).cloned(),
            id: couple.id,
            created_at: format_system_time(couple.created_at),
            anniversary: couple.anniversary.to_string(),
            daily_remaining: couple.daily_remaining,
            tickets_remaining: couple.tickets_remaining,
            streak: couple.streak,
            last_reset_date: couple.last_reset_date.to_string(),
            members: couple.members,
        }
    }
}
