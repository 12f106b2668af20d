use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{CoupleEntity, GameSessionEntity},
    dto::sse::{
        CouplePairedEvent, ServerEvent, SessionAnsweredEvent, SessionCompletedEvent,
        SessionStartedEvent,
    },
    state::SharedState,
};

/// Name of the first event of every stream.
pub const EVENT_HANDSHAKE: &str = "handshake";
const EVENT_COUPLE_PAIRED: &str = "couple.paired";
const EVENT_SESSION_STARTED: &str = "session.started";
const EVENT_SESSION_ANSWERED: &str = "session.answered";
const EVENT_SESSION_COMPLETED: &str = "session.completed";

/// Announce a committed pairing to anyone already listening on the new relationship.
pub fn broadcast_couple_paired(state: &SharedState, couple: &CoupleEntity) {
    let payload = CouplePairedEvent {
        couple_id: couple.id,
        members: couple.members.clone(),
    };
    send_couple_event(state, couple.id, EVENT_COUPLE_PAIRED, &payload);
}

/// Announce a new session to both partners.
pub fn broadcast_session_started(state: &SharedState, session: &GameSessionEntity) {
    let payload = SessionStartedEvent {
        session: session.into(),
    };
    send_couple_event(state, session.couple_id, EVENT_SESSION_STARTED, &payload);
}

/// Tell the partner that `user_id` answered, and whether that closed the session.
pub fn broadcast_session_answered(
    state: &SharedState,
    session: &GameSessionEntity,
    user_id: &str,
    completed: bool,
) {
    let payload = SessionAnsweredEvent {
        session_id: session.id,
        user_id: user_id.to_owned(),
        completed,
    };
    send_couple_event(state, session.couple_id, EVENT_SESSION_ANSWERED, &payload);
}

/// Announce that a session just completed.
pub fn broadcast_session_completed(state: &SharedState, session: &GameSessionEntity) {
    let payload = SessionCompletedEvent {
        session_id: session.id,
    };
    send_couple_event(state, session.couple_id, EVENT_SESSION_COMPLETED, &payload);
}

fn send_couple_event(state: &SharedState, couple_id: Uuid, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.couple_hubs().broadcast(couple_id, event),
        Err(err) => warn!(event, error = %err, "failed to serialize couple SSE payload"),
    }
}
