use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::UserId;

use super::game::SessionView;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name; unnamed events default to `message`.
    pub event: Option<String>,
    /// Serialized JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Wrap an already serialized payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Relationship whose events the stream carries.
    pub couple_id: Uuid,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted once the relationship record is committed.
pub struct CouplePairedEvent {
    /// Newly created relationship.
    pub couple_id: Uuid,
    /// Inviter first, then the accepting partner.
    pub members: [UserId; 2],
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when either partner starts a session.
pub struct SessionStartedEvent {
    /// The session as both partners will see it.
    pub session: SessionView,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted after each recorded answer. The value itself is not disclosed.
pub struct SessionAnsweredEvent {
    /// Session that received the answer.
    pub session_id: Uuid,
    /// Member who answered.
    pub user_id: UserId,
    /// Whether the session is now complete.
    pub completed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted once, by the answer that completes a session.
pub struct SessionCompletedEvent {
    /// Session that just completed.
    pub session_id: Uuid,
}
