use std::{
    collections::{HashMap, HashSet},
    time::SystemTime,
};

use indexmap::IndexMap;
use time::Date;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{CoupleEntity, GameKind, GameSessionEntity, UserId},
    dto::{
        game::{
            HistoryEntry, HistoryPage, HistoryQuery, SessionView, StartSessionRequest,
            StartSessionResult, SubmitAnswerRequest, SubmitAnswerResult,
        },
        parse_system_time,
    },
    error::{GameError, ServiceError},
    services::{question_source, sse_events},
    state::{
        SharedState, Tx,
        daily::{self, Allotment, Resource},
        game::{AnswerOutcome, RawAnswer, parse_answer, precheck_answer, record_answer},
    },
};

/// Recent sessions inspected to avoid serving a question twice.
const PLAYED_WINDOW: usize = 50;
/// History page size when the caller sets none.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
/// Largest accepted history page size.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Open a new session of the requested kind for the requester's relationship.
///
/// The daily reset, the consumption of one unit of the matching counter and the creation of the
/// session commit together. Running out of units or of questions is not an error: the caller
/// gets `success: false` with an explanation and nothing is written.
pub async fn start_session(
    state: &SharedState,
    requester: Option<&str>,
    request: StartSessionRequest,
) -> Result<StartSessionResult, ServiceError> {
    let requester = requester.ok_or(GameError::NotAuthenticated)?;
    let kind = request.kind;
    let couple_id = couple_of(state, requester).await?;

    let store = state.require_store().await?;
    let questions = store.active_questions(kind).await?;
    let played = store
        .list_sessions(couple_id, None, PLAYED_WINDOW)
        .await?
        .into_iter()
        .filter(|session| session.kind == kind)
        .map(|session| session.question_id)
        .collect::<HashSet<_>>();

    let picked = question_source::pick(&questions, &played, &mut rand::rng()).cloned();
    let Some(question) = picked else {
        info!(couple_id = %couple_id, kind = kind.as_str(), "no active question to serve");
        return Ok(StartSessionResult::refused(
            "no question is available for this game right now",
        ));
    };

    let now = state.now();
    let session = GameSessionEntity {
        id: Uuid::new_v4(),
        couple_id,
        question_id: question.id,
        kind,
        prompt: question.text,
        choices: question.choices,
        answers: IndexMap::new(),
        created_at: now,
        completed_at: None,
    };
    let today = state.today();
    let allotment = state.config().allotment();

    let started = {
        let requester = requester.to_owned();
        let session = session.clone();
        state
            .run_transaction("start_session", move |tx| {
                Box::pin(start_in_transaction(
                    tx,
                    requester.clone(),
                    session.clone(),
                    today,
                    allotment,
                ))
            })
            .await?
    };

    if !started {
        debug!(couple_id = %couple_id, kind = kind.as_str(), "session refused; counter exhausted");
        let message = match Resource::from(kind) {
            Resource::Daily => "today's daily question was already played",
            Resource::Ticket => "no game tickets left today",
        };
        return Ok(StartSessionResult::refused(message));
    }

    info!(
        couple_id = %couple_id,
        session_id = %session.id,
        kind = kind.as_str(),
        "session started"
    );
    sse_events::broadcast_session_started(state, &session);
    Ok(StartSessionResult::started(SessionView::from(&session)))
}

async fn start_in_transaction(
    tx: &mut Tx,
    requester: UserId,
    session: GameSessionEntity,
    today: Date,
    allotment: Allotment,
) -> Result<bool, ServiceError> {
    let couple = tx
        .couple(session.couple_id)
        .await?
        .ok_or(GameError::RelationshipNotFound)?;
    if !couple.has_member(&requester) {
        return Err(GameError::NotAMember.into());
    }

    let mut couple = daily::reset(&couple, today, allotment);
    if !daily::consume(&mut couple, Resource::from(session.kind)) {
        return Ok(false);
    }

    tx.put_couple(couple).await?;
    tx.put_session(session).await?;
    Ok(true)
}

#[derive(Clone)]
struct Submission {
    session_id: Uuid,
    requester: UserId,
    value: RawAnswer,
    now: SystemTime,
    today: Date,
    allotment: Allotment,
}

/// Record the requester's answer and report whether the session is complete afterwards.
///
/// The read of the session, the merge of the answer and the completion stamp commit as one
/// transaction, so two near-simultaneous answers from both members are both kept and exactly one
/// of them completes the session.
pub async fn submit_answer(
    state: &SharedState,
    requester: Option<&str>,
    session_id: Uuid,
    request: SubmitAnswerRequest,
) -> Result<SubmitAnswerResult, ServiceError> {
    let requester = requester.ok_or(GameError::NotAuthenticated)?;
    precheck_answer(&request.value)?;

    let submission = Submission {
        session_id,
        requester: requester.to_owned(),
        value: request.value,
        now: state.now(),
        today: state.today(),
        allotment: state.config().allotment(),
    };

    let (session, outcome) = state
        .run_transaction("submit_answer", move |tx| {
            Box::pin(submit_in_transaction(tx, submission.clone()))
        })
        .await?;

    match outcome {
        AnswerOutcome::Sealed => {
            debug!(session_id = %session_id, requester, "answer ignored; session already complete");
        }
        AnswerOutcome::Recorded { completed } => {
            sse_events::broadcast_session_answered(state, &session, requester, completed);
            if completed {
                info!(
                    couple_id = %session.couple_id,
                    session_id = %session_id,
                    "session completed"
                );
                sse_events::broadcast_session_completed(state, &session);
            }
        }
    }

    Ok(SubmitAnswerResult {
        completed: outcome.completed(),
    })
}

async fn submit_in_transaction(
    tx: &mut Tx,
    submission: Submission,
) -> Result<(GameSessionEntity, AnswerOutcome), ServiceError> {
    let Submission {
        session_id,
        requester,
        value,
        now,
        today,
        allotment,
    } = submission;

    let mut session = tx
        .session(session_id)
        .await?
        .ok_or(GameError::SessionNotFound)?;
    let couple = tx
        .couple(session.couple_id)
        .await?
        .ok_or(GameError::RelationshipNotFound)?;
    if !couple.has_member(&requester) {
        return Err(GameError::NotAMember.into());
    }

    let value = parse_answer(&session, value)?;
    let outcome = record_answer(&mut session, &couple.members, &requester, value, now)?;
    if outcome == AnswerOutcome::Sealed {
        return Ok((session, outcome));
    }

    tx.put_session(session.clone()).await?;
    if outcome.completed() && session.kind == GameKind::Daily {
        tx.put_couple(extend_streak(&couple, today, allotment))
            .await?;
    }

    Ok((session, outcome))
}

fn extend_streak(couple: &CoupleEntity, today: Date, allotment: Allotment) -> CoupleEntity {
    let mut couple = daily::reset(couple, today, allotment);
    daily::advance_streak(&mut couple, today);
    couple
}

/// Page through the sessions of the requester's relationship, newest first.
///
/// Member names are looked up best effort: a profile that cannot be read leaves
/// `display_name` empty instead of failing the page.
pub async fn history(
    state: &SharedState,
    requester: Option<&str>,
    query: HistoryQuery,
) -> Result<HistoryPage, ServiceError> {
    let requester = requester.ok_or(GameError::NotAuthenticated)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let before = match query.before.as_deref() {
        Some(raw) => Some(parse_system_time(raw).ok_or_else(|| {
            ServiceError::InvalidInput(format!("`{raw}` is not an RFC 3339 timestamp"))
        })?),
        None => None,
    };

    let couple_id = couple_of(state, requester).await?;
    let store = state.require_store().await?;
    let couple = store
        .find_couple(couple_id)
        .await?
        .ok_or(GameError::RelationshipNotFound)?;

    let mut sessions = store.list_sessions(couple_id, before, limit + 1).await?;
    let oldest = if sessions.len() > limit {
        sessions.truncate(limit);
        sessions.last().map(|session| session.created_at)
    } else {
        None
    };

    let mut names = HashMap::new();
    for member in &couple.members {
        match store.find_profile(member.clone()).await {
            Ok(Some(profile)) if !profile.display_name.is_empty() => {
                names.insert(member.clone(), profile.display_name);
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    couple_id = %couple_id,
                    member = %member,
                    error = %err,
                    "failed to resolve member name"
                );
            }
        }
    }

    let viewer_is_member = couple.has_member(requester);
    let entries = sessions
        .into_iter()
        .map(|session| HistoryEntry::new(session, requester, viewer_is_member, &names))
        .collect();

    Ok(HistoryPage::new(entries, oldest))
}

/// Relationship the requester belongs to, from their profile.
pub async fn couple_of(state: &SharedState, requester: &str) -> Result<Uuid, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_profile(requester.to_owned())
        .await?
        .and_then(|profile| profile.couple_id)
        .ok_or_else(|| GameError::NotPaired.into())
}
