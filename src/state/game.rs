use std::time::SystemTime;

use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    dao::models::{AnswerEntity, AnswerValue, GameSessionEntity, UserId},
    error::GameError,
};

const MAX_TEXT_ANSWER_CHARS: usize = 500;

/// Answer as typed by a client, before it is checked against the session kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum RawAnswer {
    /// 1-based choice index.
    Index(i64),
    /// Free text, a choice label, or a choice index written as text.
    Text(String),
}

/// Effect of merging one answer into a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The member's entry was written.
    Recorded {
        /// This very answer completed the session.
        completed: bool,
    },
    /// The session was already complete; nothing changed.
    Sealed,
}

impl AnswerOutcome {
    /// Whether the session is complete after this answer.
    pub fn completed(self) -> bool {
        match self {
            AnswerOutcome::Recorded { completed, .. } => completed,
            AnswerOutcome::Sealed => true,
        }
    }
}

/// Reject answers that cannot be valid for any session before touching storage.
pub fn precheck_answer(raw: &RawAnswer) -> Result<(), GameError> {
    match raw {
        RawAnswer::Text(text) if text.trim().is_empty() => {
            Err(GameError::InvalidAnswer("answer must not be empty".into()))
        }
        RawAnswer::Text(text) if text.chars().count() > MAX_TEXT_ANSWER_CHARS => Err(
            GameError::InvalidAnswer(format!("answer exceeds {MAX_TEXT_ANSWER_CHARS} characters")),
        ),
        _ => Ok(()),
    }
}

/// Interpret `raw` according to the kind of `session`.
///
/// Choice games accept the index (as a number or as text) or the exact label of a choice and
/// always store the index. Open questions only accept text.
pub fn parse_answer(session: &GameSessionEntity, raw: RawAnswer) -> Result<AnswerValue, GameError> {
    precheck_answer(&raw)?;

    if !session.kind.is_choice() {
        return match raw {
            RawAnswer::Text(text) => Ok(AnswerValue::Text(text.trim().to_owned())),
            RawAnswer::Index(_) => Err(GameError::InvalidAnswer(
                "this question takes a text answer".into(),
            )),
        };
    }

    let index = match raw {
        RawAnswer::Index(index) => index,
        RawAnswer::Text(text) => {
            let text = text.trim();
            let by_label = session.choices.as_ref().and_then(|choices| {
                choices
                    .iter()
                    .position(|choice| choice == text)
                    .map(|position| position as i64 + 1)
            });
            match by_label.or_else(|| text.parse().ok()) {
                Some(index) => index,
                None => {
                    return Err(GameError::InvalidAnswer(format!(
                        "`{text}` is not one of the choices"
                    )));
                }
            }
        }
    };

    match index {
        1 | 2 => Ok(AnswerValue::Choice(index as u8)),
        _ => Err(GameError::InvalidAnswer(format!(
            "choice {index} is out of range 1..=2"
        ))),
    }
}

/// Merge `user`'s answer into `session` and stamp completion when both members are present.
///
/// While the session is open a member's resubmission replaces only their own entry. Once
/// `completed_at` is set the answers are sealed.
pub fn record_answer(
    session: &mut GameSessionEntity,
    members: &[UserId; 2],
    user: &str,
    value: AnswerValue,
    now: SystemTime,
) -> Result<AnswerOutcome, GameError> {
    if !members.iter().any(|member| member == user) {
        return Err(GameError::NotAMember);
    }
    if session.completed_at.is_some() {
        return Ok(AnswerOutcome::Sealed);
    }

    session.answers.insert(
        user.to_owned(),
        AnswerEntity {
            value,
            submitted_at: now,
        },
    );

    let completed = members
        .iter()
        .all(|member| session.answers.contains_key(member));
    if completed {
        session.completed_at = Some(now);
    }

    Ok(AnswerOutcome::Recorded { completed })
}

/// Human-readable form of an answer: the choice label for choice games.
pub fn display_answer(session: &GameSessionEntity, value: &AnswerValue) -> String {
    match value {
        AnswerValue::Choice(index) => session
            .choices
            .as_ref()
            .and_then(|choices| choices.get(usize::from(*index).checked_sub(1)?))
            .cloned()
            .unwrap_or_else(|| index.to_string()),
        AnswerValue::Text(text) => text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use indexmap::IndexMap;
    use uuid::Uuid;

    use super::*;
    use crate::dao::models::GameKind;

    fn members() -> [UserId; 2] {
        ["ana".into(), "ben".into()]
    }

    fn choice_session() -> GameSessionEntity {
        GameSessionEntity {
            id: Uuid::nil(),
            couple_id: Uuid::nil(),
            question_id: Uuid::nil(),
            kind: GameKind::ThisOrThat,
            prompt: "Beach or mountains?".into(),
            choices: Some(["choice1".into(), "choice2".into()]),
            answers: IndexMap::new(),
            created_at: UNIX_EPOCH,
            completed_at: None,
        }
    }

    #[test]
    fn second_member_completes_exactly_once() {
        let mut session = choice_session();
        let members = members();
        let t1 = UNIX_EPOCH + Duration::from_secs(1);
        let t2 = UNIX_EPOCH + Duration::from_secs(2);

        let first = record_answer(&mut session, &members, "ana", AnswerValue::Choice(1), t1);
        assert_eq!(first, Ok(AnswerOutcome::Recorded { completed: false }));

        let value = parse_answer(&session, RawAnswer::Text("choice2".into())).unwrap();
        let second = record_answer(&mut session, &members, "ben", value, t2);
        assert_eq!(second, Ok(AnswerOutcome::Recorded { completed: true }));
        assert_eq!(session.completed_at, Some(t2));

        let again = record_answer(&mut session, &members, "ben", AnswerValue::Choice(1), t2);
        assert_eq!(again, Ok(AnswerOutcome::Sealed));
        assert_eq!(session.answers["ben"].value, AnswerValue::Choice(2));
        assert_eq!(session.answers.len(), 2);
    }

    #[test]
    fn resubmission_before_partner_overwrites_own_entry() {
        let mut session = choice_session();
        let members = members();

        record_answer(&mut session, &members, "ana", AnswerValue::Choice(1), UNIX_EPOCH).unwrap();
        let outcome =
            record_answer(&mut session, &members, "ana", AnswerValue::Choice(2), UNIX_EPOCH)
                .unwrap();

        assert!(!outcome.completed());
        assert_eq!(session.answers.len(), 1);
        assert_eq!(session.answers["ana"].value, AnswerValue::Choice(2));
        assert!(session.completed_at.is_none());
    }

    #[test]
    fn outsiders_cannot_answer() {
        let mut session = choice_session();

        let outcome = record_answer(
            &mut session,
            &members(),
            "eve",
            AnswerValue::Choice(1),
            UNIX_EPOCH,
        );

        assert_eq!(outcome, Err(GameError::NotAMember));
        assert!(session.answers.is_empty());
    }

    #[test]
    fn choice_answers_accept_index_label_or_digit() {
        let session = choice_session();

        assert_eq!(
            parse_answer(&session, RawAnswer::Index(1)),
            Ok(AnswerValue::Choice(1))
        );
        assert_eq!(
            parse_answer(&session, RawAnswer::Text(" choice2 ".into())),
            Ok(AnswerValue::Choice(2))
        );
        assert_eq!(
            parse_answer(&session, RawAnswer::Text("2".into())),
            Ok(AnswerValue::Choice(2))
        );
        assert!(parse_answer(&session, RawAnswer::Index(3)).is_err());
        assert!(parse_answer(&session, RawAnswer::Index(0)).is_err());
        assert!(parse_answer(&session, RawAnswer::Text("neither".into())).is_err());
    }

    #[test]
    fn open_questions_take_trimmed_text_only() {
        let mut session = choice_session();
        session.kind = GameKind::Daily;
        session.choices = None;

        assert_eq!(
            parse_answer(&session, RawAnswer::Text("  pancakes ".into())),
            Ok(AnswerValue::Text("pancakes".into()))
        );
        assert!(parse_answer(&session, RawAnswer::Index(1)).is_err());
        assert!(parse_answer(&session, RawAnswer::Text("   ".into())).is_err());
    }

    #[test]
    fn display_resolves_choice_labels() {
        let session = choice_session();

        assert_eq!(display_answer(&session, &AnswerValue::Choice(2)), "choice2");
        assert_eq!(display_answer(&session, &AnswerValue::Choice(7)), "7");
        assert_eq!(
            display_answer(&session, &AnswerValue::Text("hi".into())),
            "hi"
        );
    }
}
