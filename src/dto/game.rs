use std::{collections::HashMap, time::SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{AnswerValue, GameKind, GameSessionEntity, UserId},
    dto::format_system_time,
    state::game::{RawAnswer, display_answer},
};

/// Request opening a new round of the given game type.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    /// Game to play, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: GameKind,
}

/// A session as exposed to its members. Answer values stay hidden until history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionView {
    /// Session identifier.
    pub id: Uuid,
    /// Relationship playing the session.
    pub couple_id: Uuid,
    /// Question drawn for the session.
    pub question_id: Uuid,
    /// Game type, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: GameKind,
    /// Question text at the time the session started.
    pub prompt: String,
    /// The two options of choice games.
    pub choices: Option<[String; 2]>,
    /// Members who already answered, in answer order.
    pub answered_by: Vec<UserId>,
    /// Whether both members answered.
    pub completed: bool,
    /// RFC 3339 start instant.
    pub created_at: String,
}

impl From<&GameSessionEntity> for SessionView {
    fn from(value: &GameSessionEntity) -> Self {
        Self {
            id: value.id,
            couple_id: value.couple_id,
            question_id: value.question_id,
            kind: value.kind,
            prompt: value.prompt.clone(),
            choices: value.choices.clone(),
            answered_by: value.answers.keys().cloned().collect(),
            completed: value.completed_at.is_some(),
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Outcome of a session start. `success` is false when no resource or question is left.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartSessionResult {
    /// Whether a session was created.
    pub success: bool,
    /// The new session when `success` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
    /// Why the start was refused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StartSessionResult {
    /// A successful start.
    pub fn started(session: SessionView) -> Self {
        Self {
            success: true,
            session: Some(session),
            message: None,
        }
    }

    /// A refused start that wrote nothing.
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            session: None,
            message: Some(message.into()),
        }
    }
}

/// Answer submission. Numbers pick a choice; strings are free text or a choice label.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAnswerRequest {
    /// Raw answer, checked against the session type.
    pub value: RawAnswer,
}

/// State of the session right after the submission committed.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitAnswerResult {
    /// Whether both members have now answered.
    pub completed: bool,
}

/// Paging parameters of the history.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Page size, 20 when omitted.
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
    /// Only sessions created strictly before this RFC 3339 instant.
    pub before: Option<String>,
}

/// One member's answer, joined with their display name.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryAnswer {
    /// Member who answered.
    pub user_id: UserId,
    /// Absent when the profile could not be resolved.
    pub display_name: Option<String>,
    /// Stored answer, tagged by kind.
    #[schema(value_type = Object)]
    pub value: AnswerValue,
    /// Choice label for choice games, the text itself otherwise.
    pub display: String,
    /// RFC 3339 instant of the latest submission.
    pub submitted_at: String,
}

/// Past or pending session enriched for display.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEntry {
    /// Session identifier.
    pub session_id: Uuid,
    /// Game type, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: GameKind,
    /// Question text the session was played with.
    pub question_text: String,
    /// The two options of choice games.
    pub choices: Option<[String; 2]>,
    /// Answers in submission order.
    pub answers: Vec<HistoryAnswer>,
    /// Whether both members answered.
    pub completed: bool,
    /// Whether the viewer still owes an answer.
    pub can_answer: bool,
    /// RFC 3339 start instant.
    pub created_at: String,
}

impl HistoryEntry {
    /// Enrich `session` for `viewer`, resolving member names through `names`.
    pub fn new(
        session: GameSessionEntity,
        viewer: &str,
        viewer_is_member: bool,
        names: &HashMap<UserId, String>,
    ) -> Self {
        let answers = session
            .answers
            .iter()
            .map(|(user_id, answer)| HistoryAnswer {
                user_id: user_id.clone(),
                display_name: names.get(user_id).cloned(),
                value: answer.value.clone(),
                display: display_answer(&session, &answer.value),
                submitted_at: format_system_time(answer.submitted_at),
            })
            .collect();

        Self {
            session_id: session.id,
            kind: session.kind,
            can_answer: viewer_is_member && !session.answers.contains_key(viewer),
            completed: session.completed_at.is_some(),
            created_at: format_system_time(session.created_at),
            question_text: session.prompt,
            choices: session.choices,
            answers,
        }
    }
}

/// A page of history, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryPage {
    /// Entries of this page, newest first.
    pub entries: Vec<HistoryEntry>,
    /// Cursor for the next page; absent on the last one.
    pub next_before: Option<String>,
}

impl HistoryPage {
    /// `oldest` is the creation time of the last entry when more entries follow it.
    pub fn new(entries: Vec<HistoryEntry>, oldest: Option<SystemTime>) -> Self {
        Self {
            entries,
            next_before: oldest.map(format_system_time),
        }
    }
}
