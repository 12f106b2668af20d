mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::SystemTime,
};

use common::Harness;
use futures::future::BoxFuture;
use pairplay_back::{
    dao::{
        couple_store::{CoupleStore, StoreTransaction, memory::MemoryCoupleStore},
        models::{
            CoupleEntity, GameKind, GameSessionEntity, InviteEntity, ProfileEntity,
            QuestionEntity,
        },
        storage::{StorageError, StorageResult},
    },
    dto::{game::StartSessionRequest, pairing::AcceptInviteRequest},
    error::ServiceError,
    services::{game_service, pairing_service},
};
use uuid::Uuid;

/// How the next failing commits misbehave.
#[derive(Clone, Copy)]
enum CommitFault {
    /// Writes land but the caller hears nothing back.
    LostReply,
    /// Writes are dropped and the caller is told it lost a race.
    Rejected,
}

/// Memory store whose first `failures` commits misbehave according to `fault`.
struct FaultyStore {
    inner: Arc<MemoryCoupleStore>,
    fault: CommitFault,
    failures: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
}

impl FaultyStore {
    fn new(inner: Arc<MemoryCoupleStore>, fault: CommitFault, failures: usize) -> Self {
        Self {
            inner,
            fault,
            failures: Arc::new(AtomicUsize::new(failures)),
            commits: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct FaultyTransaction {
    inner: Box<dyn StoreTransaction>,
    fault: CommitFault,
    failures: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
}

impl CoupleStore for FaultyStore {
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>> {
        let begin = self.inner.begin();
        let fault = self.fault;
        let failures = self.failures.clone();
        let commits = self.commits.clone();
        Box::pin(async move {
            let transaction: Box<dyn StoreTransaction> = Box::new(FaultyTransaction {
                inner: begin.await?,
                fault,
                failures,
                commits,
            });
            Ok(transaction)
        })
    }

    fn find_invite(&self, code: String) -> BoxFuture<'static, StorageResult<Option<InviteEntity>>> {
        self.inner.find_invite(code)
    }

    fn insert_invite(&self, invite: InviteEntity) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.insert_invite(invite)
    }

    fn find_profile(&self, id: String) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        self.inner.find_profile(id)
    }

    fn find_couple(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<CoupleEntity>>> {
        self.inner.find_couple(id)
    }

    fn find_session(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        self.inner.find_session(id)
    }

    fn list_sessions(
        &self,
        couple_id: Uuid,
        before: Option<SystemTime>,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        self.inner.list_sessions(couple_id, before, limit)
    }

    fn active_questions(
        &self,
        kind: GameKind,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        self.inner.active_questions(kind)
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_question(question)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

impl StoreTransaction for FaultyTransaction {
    fn invite<'a>(
        &'a mut self,
        code: &'a str,
    ) -> BoxFuture<'a, StorageResult<Option<InviteEntity>>> {
        self.inner.invite(code)
    }

    fn put_invite(&mut self, invite: InviteEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.inner.put_invite(invite)
    }

    fn profile<'a>(
        &'a mut self,
        id: &'a str,
    ) -> BoxFuture<'a, StorageResult<Option<ProfileEntity>>> {
        self.inner.profile(id)
    }

    fn put_profile(&mut self, profile: ProfileEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.inner.put_profile(profile)
    }

    fn couple(&mut self, id: Uuid) -> BoxFuture<'_, StorageResult<Option<CoupleEntity>>> {
        self.inner.couple(id)
    }

    fn put_couple(&mut self, couple: CoupleEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.inner.put_couple(couple)
    }

    fn session(&mut self, id: Uuid) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        self.inner.session(id)
    }

    fn put_session(&mut self, session: GameSessionEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.inner.put_session(session)
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        let FaultyTransaction {
            inner,
            fault,
            failures,
            commits,
        } = *self;
        Box::pin(async move {
            commits.fetch_add(1, Ordering::SeqCst);
            let misbehave = failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if !misbehave {
                return inner.commit().await;
            }
            match fault {
                CommitFault::LostReply => {
                    inner.commit().await?;
                    Err(StorageError::commit_outcome_unknown("reply lost"))
                }
                CommitFault::Rejected => {
                    inner.abort().await?;
                    Err(StorageError::conflict("lost the race"))
                }
            }
        })
    }

    fn abort(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.abort()
    }
}

async fn install_faulty(harness: &Harness, fault: CommitFault) -> Arc<FaultyStore> {
    let store = Arc::new(FaultyStore::new(harness.store.clone(), fault, 1));
    harness.state.install_store(store.clone()).await;
    store
}

#[tokio::test]
async fn a_start_whose_commit_reply_is_lost_is_charged_once() {
    let harness = Harness::new().await;
    let couple_id = harness.pair("ana", "ben").await;
    let store = install_faulty(&harness, CommitFault::LostReply).await;

    let err = game_service::start_session(
        &harness.state,
        Some("ana"),
        StartSessionRequest {
            kind: GameKind::ThisOrThat,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::OutcomeUnknown), "got {err:?}");
    assert_eq!(store.commits.load(Ordering::SeqCst), 1);

    let couple = harness.couple(couple_id).await;
    assert_eq!(couple.tickets_remaining, 2);
    let sessions = harness
        .store
        .list_sessions(couple_id, None, 10)
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
}

#[tokio::test]
async fn an_acceptance_whose_commit_reply_is_lost_is_not_reported_as_refused() {
    let harness = Harness::new().await;
    harness.profile("ana", "Ana").await;
    harness.profile("ben", "Ben").await;
    harness.invite("ABC123", "ana").await;
    let store = install_faulty(&harness, CommitFault::LostReply).await;

    let err = pairing_service::accept_invite(
        &harness.state,
        Some("ben"),
        "ABC123",
        AcceptInviteRequest {
            anniversary: "14/02/2024".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::OutcomeUnknown), "got {err:?}");
    assert_eq!(store.commits.load(Ordering::SeqCst), 1);

    // The pairing did land; a reload shows it.
    let ben = harness
        .store
        .find_profile("ben".into())
        .await
        .unwrap()
        .unwrap();
    assert!(ben.couple_id.is_some());
}

#[tokio::test]
async fn a_rejected_commit_runs_the_work_again() {
    let harness = Harness::new().await;
    let couple_id = harness.pair("ana", "ben").await;
    let store = install_faulty(&harness, CommitFault::Rejected).await;

    let session = harness.start("ana", GameKind::ThisOrThat).await;
    assert!(session.is_some());
    assert_eq!(store.commits.load(Ordering::SeqCst), 2);

    let couple = harness.couple(couple_id).await;
    assert_eq!(couple.tickets_remaining, 2);
}
