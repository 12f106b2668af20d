pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    CoupleEntity, GameKind, GameSessionEntity, InviteEntity, ProfileEntity, QuestionEntity,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the shared document store holding invites, profiles, couples and sessions.
///
/// Reads outside [`CoupleStore::begin`] are advisory: anything that gates a mutation of shared
/// fields must be re-read inside a [`StoreTransaction`].
pub trait CoupleStore: Send + Sync {
    /// Open a serializable multi-document transaction.
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>>;

    /// Invite stored under `code`.
    fn find_invite(&self, code: String) -> BoxFuture<'static, StorageResult<Option<InviteEntity>>>;
    /// Insert `invite` unless a record with the same code exists. Returns whether it was stored.
    fn insert_invite(&self, invite: InviteEntity) -> BoxFuture<'static, StorageResult<bool>>;

    /// Profile of user `id`.
    fn find_profile(&self, id: String) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>>;

    /// Relationship `id`.
    fn find_couple(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<CoupleEntity>>>;

    /// Session `id`.
    fn find_session(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>>;
    /// Sessions of a couple, newest first, optionally strictly older than `before`.
    fn list_sessions(
        &self,
        couple_id: Uuid,
        before: Option<SystemTime>,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>>;

    /// Every servable question of `kind`.
    fn active_questions(
        &self,
        kind: GameKind,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Upsert a question keyed by its id.
    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Probe the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace the backend connection after a failed probe.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Atomic, isolated unit of work over the shared documents.
///
/// Reads observe the transaction's own pending writes. Nothing becomes visible to other
/// transactions before [`StoreTransaction::commit`] succeeds, and a failed commit applies nothing.
pub trait StoreTransaction: Send {
    /// Read the invite under `code`.
    fn invite<'a>(
        &'a mut self,
        code: &'a str,
    ) -> BoxFuture<'a, StorageResult<Option<InviteEntity>>>;
    /// Buffer an insert or replacement of `invite`.
    fn put_invite(&mut self, invite: InviteEntity) -> BoxFuture<'_, StorageResult<()>>;

    /// Read the profile of user `id`.
    fn profile<'a>(
        &'a mut self,
        id: &'a str,
    ) -> BoxFuture<'a, StorageResult<Option<ProfileEntity>>>;
    /// Buffer an insert or replacement of `profile`.
    fn put_profile(&mut self, profile: ProfileEntity) -> BoxFuture<'_, StorageResult<()>>;

    /// Read relationship `id`.
    fn couple(&mut self, id: Uuid) -> BoxFuture<'_, StorageResult<Option<CoupleEntity>>>;
    /// Buffer an insert or replacement of `couple`.
    fn put_couple(&mut self, couple: CoupleEntity) -> BoxFuture<'_, StorageResult<()>>;

    /// Read session `id`.
    fn session(&mut self, id: Uuid) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>>;
    /// Buffer an insert or replacement of `session`.
    fn put_session(&mut self, session: GameSessionEntity) -> BoxFuture<'_, StorageResult<()>>;

    /// Apply every buffered write atomically, or fail with [`StorageError::Conflict`] when a
    /// concurrent commit invalidated what this transaction read. A conflict guarantees nothing
    /// was applied; when that cannot be known the backend reports
    /// [`StorageError::CommitOutcomeUnknown`] instead.
    ///
    /// [`StorageError::Conflict`]: crate::dao::storage::StorageError::Conflict
    /// [`StorageError::CommitOutcomeUnknown`]: crate::dao::storage::StorageError::CommitOutcomeUnknown
    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>>;
    /// Discard the transaction.
    fn abort(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>>;
}
