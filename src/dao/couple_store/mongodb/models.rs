use indexmap::IndexMap;
use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::dao::{
    calendar_date,
    models::{
        AnswerEntity, AnswerValue, CoupleEntity, GameKind, GameSessionEntity, InviteEntity,
        ProfileEntity, QuestionEntity, UserId,
    },
    storage::StorageError,
};

pub const INVITE_COLLECTION: &str = "invites";
pub const PROFILE_COLLECTION: &str = "profiles";
pub const COUPLE_COLLECTION: &str = "couples";
pub const SESSION_COLLECTION: &str = "game_sessions";
pub const QUESTION_COLLECTION: &str = "questions";

/// Filter matching a document by its string key.
pub fn by_id(id: &str) -> Document {
    doc! { "_id": id }
}

fn parse_uuid(raw: &str, owner: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(raw).map_err(|_| StorageError::Corrupt {
        id: owner.to_owned(),
        reason: format!("invalid UUID `{raw}`"),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoInviteDocument {
    #[serde(rename = "_id")]
    code: String,
    created_by: String,
    created_at: DateTime,
    expires_at: DateTime,
    used: bool,
    used_by: Option<String>,
    used_at: Option<DateTime>,
}

impl From<InviteEntity> for MongoInviteDocument {
    fn from(value: InviteEntity) -> Self {
        Self {
            code: value.code,
            created_by: value.created_by,
            created_at: DateTime::from_system_time(value.created_at),
            expires_at: DateTime::from_system_time(value.expires_at),
            used: value.used,
            used_by: value.used_by,
            used_at: value.used_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoInviteDocument> for InviteEntity {
    fn from(value: MongoInviteDocument) -> Self {
        Self {
            code: value.code,
            created_by: value.created_by,
            created_at: value.created_at.to_system_time(),
            expires_at: value.expires_at.to_system_time(),
            used: value.used,
            used_by: value.used_by,
            used_at: value.used_at.map(DateTime::to_system_time),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoProfileDocument {
    #[serde(rename = "_id")]
    id: String,
    display_name: String,
    couple_id: Option<String>,
    paired_at: Option<DateTime>,
    created_at: DateTime,
}

impl From<ProfileEntity> for MongoProfileDocument {
    fn from(value: ProfileEntity) -> Self {
        Self {
            id: value.id,
            display_name: value.display_name,
            couple_id: value.couple_id.map(|id| id.to_string()),
            paired_at: value.paired_at.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoProfileDocument> for ProfileEntity {
    type Error = StorageError;

    fn try_from(value: MongoProfileDocument) -> Result<Self, Self::Error> {
        let couple_id = value
            .couple_id
            .as_deref()
            .map(|raw| parse_uuid(raw, &value.id))
            .transpose()?;
        Ok(Self {
            id: value.id,
            display_name: value.display_name,
            couple_id,
            paired_at: value.paired_at.map(DateTime::to_system_time),
            created_at: value.created_at.to_system_time(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCoupleDocument {
    #[serde(rename = "_id")]
    id: String,
    members: [String; 2],
    created_at: DateTime,
    #[serde(with = "calendar_date")]
    anniversary: Date,
    daily_remaining: i64,
    tickets_remaining: i64,
    streak: i64,
    #[serde(with = "calendar_date")]
    last_reset_date: Date,
    #[serde(with = "calendar_date::option", default)]
    last_streak_date: Option<Date>,
}

impl From<CoupleEntity> for MongoCoupleDocument {
    fn from(value: CoupleEntity) -> Self {
        Self {
            id: value.id.to_string(),
            members: value.members,
            created_at: DateTime::from_system_time(value.created_at),
            anniversary: value.anniversary,
            daily_remaining: i64::from(value.daily_remaining),
            tickets_remaining: i64::from(value.tickets_remaining),
            streak: i64::from(value.streak),
            last_reset_date: value.last_reset_date,
            last_streak_date: value.last_streak_date,
        }
    }
}

fn counter(raw: i64, field: &str, owner: &str) -> Result<u32, StorageError> {
    u32::try_from(raw).map_err(|_| StorageError::Corrupt {
        id: owner.to_owned(),
        reason: format!("counter `{field}` out of range: {raw}"),
    })
}

impl TryFrom<MongoCoupleDocument> for CoupleEntity {
    type Error = StorageError;

    fn try_from(value: MongoCoupleDocument) -> Result<Self, Self::Error> {
        let owner = value.id.as_str();
        Ok(Self {
            id: parse_uuid(owner, owner)?,
            daily_remaining: counter(value.daily_remaining, "daily_remaining", owner)?,
            tickets_remaining: counter(value.tickets_remaining, "tickets_remaining", owner)?,
            streak: counter(value.streak, "streak", owner)?,
            members: value.members,
            created_at: value.created_at.to_system_time(),
            anniversary: value.anniversary,
            last_reset_date: value.last_reset_date,
            last_streak_date: value.last_streak_date,
        })
    }
}

/// Answers are stored as an array since user ids are not safe field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    user_id: UserId,
    value: AnswerValue,
    submitted_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: String,
    couple_id: String,
    question_id: String,
    kind: GameKind,
    prompt: String,
    choices: Option<[String; 2]>,
    answers: Vec<MongoAnswerDocument>,
    created_at: DateTime,
    completed_at: Option<DateTime>,
}

impl From<GameSessionEntity> for MongoSessionDocument {
    fn from(value: GameSessionEntity) -> Self {
        Self {
            id: value.id.to_string(),
            couple_id: value.couple_id.to_string(),
            question_id: value.question_id.to_string(),
            kind: value.kind,
            prompt: value.prompt,
            choices: value.choices,
            answers: value
                .answers
                .into_iter()
                .map(|(user_id, answer)| MongoAnswerDocument {
                    user_id,
                    value: answer.value,
                    submitted_at: DateTime::from_system_time(answer.submitted_at),
                })
                .collect(),
            created_at: DateTime::from_system_time(value.created_at),
            completed_at: value.completed_at.map(DateTime::from_system_time),
        }
    }
}

impl TryFrom<MongoSessionDocument> for GameSessionEntity {
    type Error = StorageError;

    fn try_from(value: MongoSessionDocument) -> Result<Self, Self::Error> {
        let owner = value.id.as_str();
        let answers = value
            .answers
            .into_iter()
            .map(|answer| {
                (
                    answer.user_id,
                    AnswerEntity {
                        value: answer.value,
                        submitted_at: answer.submitted_at.to_system_time(),
                    },
                )
            })
            .collect::<IndexMap<_, _>>();

        Ok(Self {
            id: parse_uuid(owner, owner)?,
            couple_id: parse_uuid(&value.couple_id, owner)?,
            question_id: parse_uuid(&value.question_id, owner)?,
            kind: value.kind,
            prompt: value.prompt,
            choices: value.choices,
            answers,
            created_at: value.created_at.to_system_time(),
            completed_at: value.completed_at.map(DateTime::to_system_time),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    id: String,
    text: String,
    kind: GameKind,
    choices: Option<[String; 2]>,
    active: bool,
    selection_weight: i64,
}

impl From<QuestionEntity> for MongoQuestionDocument {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id.to_string(),
            text: value.text,
            kind: value.kind,
            choices: value.choices,
            active: value.active,
            selection_weight: i64::from(value.selection_weight),
        }
    }
}

impl TryFrom<MongoQuestionDocument> for QuestionEntity {
    type Error = StorageError;

    fn try_from(value: MongoQuestionDocument) -> Result<Self, Self::Error> {
        let owner = value.id.as_str();
        Ok(Self {
            id: parse_uuid(owner, owner)?,
            selection_weight: counter(value.selection_weight, "selection_weight", owner)?,
            text: value.text,
            kind: value.kind,
            choices: value.choices,
            active: value.active,
        })
    }
}
