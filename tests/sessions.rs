mod common;

use std::{sync::Arc, time::Duration};

use common::{DAY, Harness};
use pairplay_back::{
    dao::{
        couple_store::CoupleStore,
        models::{AnswerValue, GameKind},
    },
    dto::game::{HistoryQuery, StartSessionRequest, SubmitAnswerRequest},
    error::{GameError, ServiceError},
    services::{couple_service, game_service},
    state::game::RawAnswer,
};
use time::macros::date;
use uuid::Uuid;

fn game_error(err: ServiceError) -> GameError {
    match err {
        ServiceError::Game(err) => err,
        other => panic!("expected a game failure, got {other:?}"),
    }
}

async fn answer(
    harness: &Harness,
    requester: &str,
    session_id: Uuid,
    value: RawAnswer,
) -> Result<bool, ServiceError> {
    game_service::submit_answer(
        &harness.state,
        Some(requester),
        session_id,
        SubmitAnswerRequest { value },
    )
    .await
    .map(|result| result.completed)
}

fn text(value: &str) -> RawAnswer {
    RawAnswer::Text(value.into())
}

#[tokio::test]
async fn starting_a_session_consumes_one_unit_of_the_matching_counter() {
    let harness = Harness::new().await;
    let couple_id = harness.pair("ana", "ben").await;

    let session = harness.start("ana", GameKind::ThisOrThat).await.unwrap();
    assert_eq!(session.couple_id, couple_id);
    assert_eq!(session.kind, GameKind::ThisOrThat);
    assert!(session.choices.is_some());
    assert!(session.answered_by.is_empty());
    assert!(!session.completed);

    let couple = harness.couple(couple_id).await;
    assert_eq!(couple.tickets_remaining, 2);
    assert_eq!(couple.daily_remaining, 1);

    harness.start("ben", GameKind::Daily).await.unwrap();
    let couple = harness.couple(couple_id).await;
    assert_eq!(couple.daily_remaining, 0);
    assert_eq!(couple.tickets_remaining, 2);
}

#[tokio::test]
async fn exhausted_counters_refuse_without_writing() {
    let harness = Harness::new().await;
    let couple_id = harness.pair("ana", "ben").await;

    for kind in [GameKind::ThisOrThat, GameKind::MoreLikely, GameKind::WouldYouRather] {
        assert!(harness.start("ana", kind).await.is_some());
    }
    let refused = game_service::start_session(
        &harness.state,
        Some("ben"),
        StartSessionRequest {
            kind: GameKind::ThisOrThat,
        },
    )
    .await
    .unwrap();
    assert!(!refused.success);
    assert!(refused.session.is_none());
    assert!(refused.message.is_some());

    assert!(harness.start("ana", GameKind::Daily).await.is_some());
    assert!(harness.start("ana", GameKind::Daily).await.is_none());

    let couple = harness.couple(couple_id).await;
    assert_eq!(couple.tickets_remaining, 0);
    assert_eq!(couple.daily_remaining, 0);
    let sessions = harness
        .store
        .list_sessions(couple_id, None, 50)
        .await
        .unwrap();
    assert_eq!(sessions.len(), 4);
}

#[tokio::test]
async fn a_new_calendar_day_restores_the_allotment() {
    let harness = Harness::new().await;
    let couple_id = harness.pair("ana", "ben").await;
    for _ in 0..3 {
        harness.start("ana", GameKind::ThisOrThat).await.unwrap();
    }
    assert!(harness.start("ana", GameKind::ThisOrThat).await.is_none());

    harness.clock.advance(DAY);

    // Reading shows today's counters without persisting the reset.
    let view = couple_service::get_couple(&harness.state, Some("ben"))
        .await
        .unwrap();
    assert_eq!(view.tickets_remaining, 3);
    assert_eq!(view.last_reset_date, "2024-06-02");
    assert_eq!(view.partner_id.as_deref(), Some("ana"));
    assert_eq!(
        harness.couple(couple_id).await.last_reset_date,
        date!(2024 - 06 - 01)
    );

    assert!(harness.start("ana", GameKind::ThisOrThat).await.is_some());
    let couple = harness.couple(couple_id).await;
    assert_eq!(couple.tickets_remaining, 2);
    assert_eq!(couple.daily_remaining, 1);
    assert_eq!(couple.last_reset_date, date!(2024 - 06 - 02));
}

#[tokio::test]
async fn resubmission_overwrites_until_the_partner_answers() {
    let harness = Harness::new().await;
    harness.pair("ana", "ben").await;
    let session = harness.start("ana", GameKind::ThisOrThat).await.unwrap();
    let [_, second_label] = session.choices.clone().unwrap();

    assert!(!answer(&harness, "ana", session.id, RawAnswer::Index(1)).await.unwrap());
    assert!(!answer(&harness, "ana", session.id, text(&second_label)).await.unwrap());

    let stored = harness
        .store
        .find_session(session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.answers.len(), 1);
    assert_eq!(stored.answers["ana"].value, AnswerValue::Choice(2));
    assert!(stored.completed_at.is_none());

    assert!(answer(&harness, "ben", session.id, text("1")).await.unwrap());
    let completed = harness
        .store
        .find_session(session.id)
        .await
        .unwrap()
        .unwrap();
    let completed_at = completed.completed_at.unwrap();
    assert_eq!(completed.answers.len(), 2);

    // Sealed: a late change is acknowledged but not applied.
    harness.clock.advance(Duration::from_secs(60));
    assert!(answer(&harness, "ana", session.id, RawAnswer::Index(1)).await.unwrap());
    let sealed = harness
        .store
        .find_session(session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sealed.answers["ana"].value, AnswerValue::Choice(2));
    assert_eq!(sealed.completed_at, Some(completed_at));
}

#[tokio::test]
async fn answers_must_fit_the_session_and_come_from_members() {
    let harness = Harness::new().await;
    harness.pair("ana", "ben").await;
    harness.pair("carl", "dora").await;
    let choice = harness.start("ana", GameKind::MoreLikely).await.unwrap();
    let daily = harness.start("ana", GameKind::Daily).await.unwrap();

    let err = answer(&harness, "carl", choice.id, RawAnswer::Index(1))
        .await
        .unwrap_err();
    assert_eq!(game_error(err), GameError::NotAMember);

    let err = answer(&harness, "ana", choice.id, RawAnswer::Index(3))
        .await
        .unwrap_err();
    assert!(matches!(game_error(err), GameError::InvalidAnswer(_)));

    let err = answer(&harness, "ana", choice.id, text("Neither"))
        .await
        .unwrap_err();
    assert!(matches!(game_error(err), GameError::InvalidAnswer(_)));

    let err = answer(&harness, "ana", daily.id, RawAnswer::Index(1))
        .await
        .unwrap_err();
    assert!(matches!(game_error(err), GameError::InvalidAnswer(_)));

    let err = answer(&harness, "ana", daily.id, text("   "))
        .await
        .unwrap_err();
    assert!(matches!(game_error(err), GameError::InvalidAnswer(_)));

    let err = answer(&harness, "ana", Uuid::new_v4(), text("hello"))
        .await
        .unwrap_err();
    assert_eq!(game_error(err), GameError::SessionNotFound);

    let err = game_service::submit_answer(
        &harness.state,
        None,
        daily.id,
        SubmitAnswerRequest { value: text("hi") },
    )
    .await
    .unwrap_err();
    assert_eq!(game_error(err), GameError::NotAuthenticated);

    let stored = harness.store.find_session(daily.id).await.unwrap().unwrap();
    assert!(stored.answers.is_empty());
}

#[tokio::test]
async fn unpaired_requesters_cannot_play() {
    let harness = Harness::new().await;
    harness.profile("solo", "Solo").await;

    let err = game_service::start_session(
        &harness.state,
        Some("solo"),
        StartSessionRequest {
            kind: GameKind::Daily,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(game_error(err), GameError::NotPaired);
}

#[tokio::test]
async fn an_empty_catalogue_refuses_politely() {
    let harness = Harness::with_json(r#"{"questions": []}"#).await;
    let couple_id = harness.pair("ana", "ben").await;

    let refused = game_service::start_session(
        &harness.state,
        Some("ana"),
        StartSessionRequest {
            kind: GameKind::WouldYouRather,
        },
    )
    .await
    .unwrap();
    assert!(!refused.success);
    assert_eq!(harness.couple(couple_id).await.tickets_remaining, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_answers_complete_each_session_exactly_once() {
    let harness = Arc::new(Harness::with_json(r#"{"ticket_allotment": 50}"#).await);
    harness.pair("ana", "ben").await;

    for round in 0..10 {
        let session_id = harness.start("ana", GameKind::ThisOrThat).await.unwrap().id;
        let submit = |user: &'static str, choice: i64| {
            let harness = harness.clone();
            tokio::spawn(async move {
                answer(&harness, user, session_id, RawAnswer::Index(choice)).await
            })
        };
        let (ana, ben) = tokio::join!(submit("ana", 1), submit("ben", 2));
        let flags = [ana.unwrap().unwrap(), ben.unwrap().unwrap()];

        assert_eq!(
            flags.iter().filter(|completed| **completed).count(),
            1,
            "round {round}: {flags:?}"
        );
        let stored = harness
            .store
            .find_session(session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.completed_at.is_some());
        assert_eq!(stored.answers["ana"].value, AnswerValue::Choice(1));
        assert_eq!(stored.answers["ben"].value, AnswerValue::Choice(2));
    }
}

#[tokio::test]
async fn completing_daily_questions_builds_a_streak() {
    let harness = Harness::new().await;
    let couple_id = harness.pair("ana", "ben").await;

    let harness = &harness;
    let play_daily = || async move {
        let session = harness.start("ana", GameKind::Daily).await.unwrap();
        answer(harness, "ana", session.id, text("Coffee in bed"))
            .await
            .unwrap();
        answer(harness, "ben", session.id, text("The sunset walk"))
            .await
            .unwrap()
    };

    assert!(play_daily().await);
    assert_eq!(harness.couple(couple_id).await.streak, 1);

    harness.clock.advance(DAY);
    assert!(play_daily().await);
    let couple = harness.couple(couple_id).await;
    assert_eq!(couple.streak, 2);
    assert_eq!(couple.last_streak_date, Some(date!(2024 - 06 - 02)));

    // A skipped day starts over.
    harness.clock.advance(DAY * 2);
    assert!(play_daily().await);
    assert_eq!(harness.couple(couple_id).await.streak, 1);

    // Choice games leave the streak alone.
    let session = harness.start("ana", GameKind::ThisOrThat).await.unwrap();
    answer(&harness, "ana", session.id, RawAnswer::Index(1))
        .await
        .unwrap();
    answer(&harness, "ben", session.id, RawAnswer::Index(1))
        .await
        .unwrap();
    assert_eq!(harness.couple(couple_id).await.streak, 1);
}

#[tokio::test]
async fn history_is_enriched_newest_first_and_paged() {
    let harness = Harness::new().await;
    harness.pair("ana", "ben").await;

    let first = harness.start("ana", GameKind::ThisOrThat).await.unwrap();
    let [first_label, _] = first.choices.clone().unwrap();
    answer(&harness, "ana", first.id, RawAnswer::Index(1))
        .await
        .unwrap();
    answer(&harness, "ben", first.id, RawAnswer::Index(2))
        .await
        .unwrap();

    harness.clock.advance(Duration::from_secs(60));
    let second = harness.start("ben", GameKind::Daily).await.unwrap();
    answer(&harness, "ben", second.id, text("Dancing in the kitchen"))
        .await
        .unwrap();

    harness.clock.advance(Duration::from_secs(60));
    let third = harness.start("ana", GameKind::MoreLikely).await.unwrap();

    let page = game_service::history(
        &harness.state,
        Some("ana"),
        HistoryQuery {
            limit: Some(2),
            before: None,
        },
    )
    .await
    .unwrap();
    let ids = page
        .entries
        .iter()
        .map(|entry| entry.session_id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![third.id, second.id]);
    assert!(page.entries[0].can_answer);
    assert!(page.entries[0].answers.is_empty());

    let daily = &page.entries[1];
    assert!(daily.can_answer);
    assert!(!daily.completed);
    assert_eq!(daily.answers.len(), 1);
    assert_eq!(daily.answers[0].display_name.as_deref(), Some("Ben"));
    assert_eq!(daily.answers[0].display, "Dancing in the kitchen");

    let next = game_service::history(
        &harness.state,
        Some("ana"),
        HistoryQuery {
            limit: Some(2),
            before: page.next_before.clone(),
        },
    )
    .await
    .unwrap();
    assert_eq!(next.entries.len(), 1);
    assert!(next.next_before.is_none());

    let oldest = &next.entries[0];
    assert_eq!(oldest.session_id, first.id);
    assert!(oldest.completed);
    assert!(!oldest.can_answer);
    assert_eq!(oldest.answers[0].user_id, "ana");
    assert_eq!(oldest.answers[0].display, first_label);
    assert_eq!(oldest.answers[0].value, AnswerValue::Choice(1));

    let err = game_service::history(
        &harness.state,
        Some("ana"),
        HistoryQuery {
            limit: None,
            before: Some("last tuesday".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}
