use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::Date;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::calendar_date;

/// Identifier issued by the upstream identity provider.
pub type UserId = String;

/// Mini-game flavours a session can be played as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// Open question answered with free text.
    Daily,
    /// Pick one of two options.
    ThisOrThat,
    /// Pick which partner is more likely to do something.
    MoreLikely,
    /// Pick one of two hypotheticals.
    WouldYouRather,
}

impl GameKind {
    /// Stable storage key of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            GameKind::Daily => "daily",
            GameKind::ThisOrThat => "this_or_that",
            GameKind::MoreLikely => "more_likely",
            GameKind::WouldYouRather => "would_you_rather",
        }
    }

    /// Parse a storage key back into a kind.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "daily" => Some(GameKind::Daily),
            "this_or_that" => Some(GameKind::ThisOrThat),
            "more_likely" => Some(GameKind::MoreLikely),
            "would_you_rather" => Some(GameKind::WouldYouRather),
            _ => None,
        }
    }

    /// Whether answers are an index into two choices rather than free text.
    pub fn is_choice(self) -> bool {
        !matches!(self, GameKind::Daily)
    }
}

/// Single-use pairing invite, kept after use for audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InviteEntity {
    /// Six symbol code, also the document key.
    pub code: String,
    /// User who issued the invite.
    pub created_by: UserId,
    /// Issue instant.
    pub created_at: SystemTime,
    /// Instant from which the code is refused.
    pub expires_at: SystemTime,
    /// Set exactly once, by the accepting transaction.
    pub used: bool,
    /// Partner who accepted the invite.
    pub used_by: Option<UserId>,
    /// Acceptance instant.
    pub used_at: Option<SystemTime>,
}

/// Pairing-relevant projection of a user profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileEntity {
    /// User id forwarded by the gateway; the document key.
    pub id: UserId,
    /// Name shown to the partner.
    pub display_name: String,
    /// Relationship this user belongs to; immutable once set.
    pub couple_id: Option<Uuid>,
    /// Instant of the pairing, set with `couple_id`.
    pub paired_at: Option<SystemTime>,
    /// Instant the profile was first stored.
    pub created_at: SystemTime,
}

impl ProfileEntity {
    /// Fresh unpaired profile.
    pub fn new(id: UserId, display_name: String, now: SystemTime) -> Self {
        Self {
            id,
            display_name,
            couple_id: None,
            paired_at: None,
            created_at: now,
        }
    }

    /// Whether a pairing transaction already linked this profile.
    pub fn is_paired(&self) -> bool {
        self.couple_id.is_some()
    }
}

/// Durable shared record of a pair and its consumable counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoupleEntity {
    /// Relationship identifier.
    pub id: Uuid,
    /// Inviter first, invitee second. Order only matters for display.
    pub members: [UserId; 2],
    /// Pairing instant.
    pub created_at: SystemTime,
    /// Date the partners gave when pairing.
    #[serde(with = "calendar_date")]
    pub anniversary: Date,
    /// Daily questions left for the current civil day.
    pub daily_remaining: u32,
    /// Tickets left for the current civil day.
    pub tickets_remaining: u32,
    /// Consecutive civil days with a completed daily question.
    pub streak: u32,
    /// Civil date of the last counter restoration.
    #[serde(with = "calendar_date")]
    pub last_reset_date: Date,
    /// Civil date of the last completed daily question.
    #[serde(with = "calendar_date::option", default)]
    pub last_streak_date: Option<Date>,
}

impl CoupleEntity {
    /// Whether `user` is one of the two members.
    pub fn has_member(&self, user: &str) -> bool {
        self.members.iter().any(|member| member == user)
    }

    /// The member that is not `user`, if `user` belongs to the couple.
    pub fn partner_of(&self, user: &str) -> Option<&UserId> {
        match &self.members {
            [first, second] if first == user => Some(second),
            [first, second] if second == user => Some(first),
            _ => None,
        }
    }
}

/// Answer payload, discriminated by the kind of the session it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// 1-based index into the session choices.
    Choice(u8),
    /// Free text for open questions.
    Text(String),
}

/// One member's answer inside a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerEntity {
    /// Parsed answer.
    pub value: AnswerValue,
    /// Instant of the latest submission.
    pub submitted_at: SystemTime,
}

/// A mini-game round scoped under a couple.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSessionEntity {
    /// Session identifier.
    pub id: Uuid,
    /// Owning relationship.
    pub couple_id: Uuid,
    /// Question drawn at start.
    pub question_id: Uuid,
    /// Game type, which decides the answer shape.
    pub kind: GameKind,
    /// Question text copied at start.
    pub prompt: String,
    /// Options copied at start for choice games.
    pub choices: Option<[String; 2]>,
    /// At most one entry per member, in submission order.
    pub answers: IndexMap<UserId, AnswerEntity>,
    /// Start instant; history orders on it.
    pub created_at: SystemTime,
    /// Stamped once, when the second member answers.
    pub completed_at: Option<SystemTime>,
}

/// Curated question content. Read-only for the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Content-derived identifier.
    pub id: Uuid,
    /// Prompt.
    pub text: String,
    /// Game type.
    pub kind: GameKind,
    /// The two options of choice games.
    pub choices: Option<[String; 2]>,
    /// Whether the question can be served.
    pub active: bool,
    /// Relative selection weight.
    pub selection_weight: u32,
}
