//! In-process backend with serializable optimistic concurrency control.
//!
//! Every document carries a version stamped from a store-wide counter. A transaction remembers
//! the version of each document it read (`0` for absent ones) and buffers its writes; commit
//! re-validates the whole read set under the write lock and applies the buffer only when
//! nothing it depends on moved. Used for tests and for running without a database.

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    couple_store::{CoupleStore, StoreTransaction},
    models::{
        CoupleEntity, GameKind, GameSessionEntity, InviteEntity, ProfileEntity, QuestionEntity,
        UserId,
    },
    storage::{StorageError, StorageResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DocKey {
    Invite(String),
    Profile(UserId),
    Couple(Uuid),
    Session(Uuid),
}

#[derive(Debug, Clone)]
enum Document {
    Invite(InviteEntity),
    Profile(ProfileEntity),
    Couple(CoupleEntity),
    Session(GameSessionEntity),
}

impl Document {
    fn key(&self) -> DocKey {
        match self {
            Document::Invite(invite) => DocKey::Invite(invite.code.clone()),
            Document::Profile(profile) => DocKey::Profile(profile.id.clone()),
            Document::Couple(couple) => DocKey::Couple(couple.id),
            Document::Session(session) => DocKey::Session(session.id),
        }
    }
}

#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    value: T,
}

#[derive(Default)]
struct Documents {
    last_version: u64,
    invites: HashMap<String, Versioned<InviteEntity>>,
    profiles: HashMap<UserId, Versioned<ProfileEntity>>,
    couples: HashMap<Uuid, Versioned<CoupleEntity>>,
    sessions: HashMap<Uuid, Versioned<GameSessionEntity>>,
    questions: IndexMap<Uuid, QuestionEntity>,
}

impl Documents {
    /// Current version and value of a document, `(0, None)` when absent.
    fn snapshot(&self, key: &DocKey) -> (u64, Option<Document>) {
        fn split<T: Clone>(
            entry: Option<&Versioned<T>>,
            wrap: fn(T) -> Document,
        ) -> (u64, Option<Document>) {
            entry.map_or((0, None), |doc| (doc.version, Some(wrap(doc.value.clone()))))
        }

        match key {
            DocKey::Invite(code) => split(self.invites.get(code), Document::Invite),
            DocKey::Profile(id) => split(self.profiles.get(id), Document::Profile),
            DocKey::Couple(id) => split(self.couples.get(id), Document::Couple),
            DocKey::Session(id) => split(self.sessions.get(id), Document::Session),
        }
    }

    fn version_of(&self, key: &DocKey) -> u64 {
        self.snapshot(key).0
    }

    fn apply(&mut self, document: Document) {
        self.last_version += 1;
        let version = self.last_version;
        match document {
            Document::Invite(value) => {
                self.invites
                    .insert(value.code.clone(), Versioned { version, value });
            }
            Document::Profile(value) => {
                self.profiles
                    .insert(value.id.clone(), Versioned { version, value });
            }
            Document::Couple(value) => {
                self.couples.insert(value.id, Versioned { version, value });
            }
            Document::Session(value) => {
                self.sessions.insert(value.id, Versioned { version, value });
            }
        }
    }
}

/// Shared, clonable in-memory [`CoupleStore`].
#[derive(Clone, Default)]
pub struct MemoryCoupleStore {
    documents: Arc<RwLock<Documents>>,
}

impl MemoryCoupleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn read(&self, key: DocKey) -> Option<Document> {
        self.documents.read().await.snapshot(&key).1
    }
}

struct MemoryTransaction {
    documents: Arc<RwLock<Documents>>,
    reads: HashMap<DocKey, u64>,
    writes: IndexMap<DocKey, Document>,
}

impl MemoryTransaction {
    async fn read(&mut self, key: DocKey) -> Option<Document> {
        if let Some(pending) = self.writes.get(&key) {
            return Some(pending.clone());
        }

        let (version, document) = self.documents.read().await.snapshot(&key);
        // The first observed version is the one the commit validates against.
        self.reads.entry(key).or_insert(version);
        document
    }

    fn stage(&mut self, document: Document) {
        self.writes.insert(document.key(), document);
    }
}

fn mismatched(key: &str) -> StorageError {
    StorageError::Corrupt {
        id: key.to_owned(),
        reason: "document stored under a key of another collection".into(),
    }
}

impl StoreTransaction for MemoryTransaction {
    fn invite<'a>(
        &'a mut self,
        code: &'a str,
    ) -> BoxFuture<'a, StorageResult<Option<InviteEntity>>> {
        Box::pin(async move {
            match self.read(DocKey::Invite(code.to_owned())).await {
                Some(Document::Invite(invite)) => Ok(Some(invite)),
                Some(_) => Err(mismatched(code)),
                None => Ok(None),
            }
        })
    }

    fn put_invite(&mut self, invite: InviteEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.stage(Document::Invite(invite));
        Box::pin(async { Ok(()) })
    }

    fn profile<'a>(
        &'a mut self,
        id: &'a str,
    ) -> BoxFuture<'a, StorageResult<Option<ProfileEntity>>> {
        Box::pin(async move {
            match self.read(DocKey::Profile(id.to_owned())).await {
                Some(Document::Profile(profile)) => Ok(Some(profile)),
                Some(_) => Err(mismatched(id)),
                None => Ok(None),
            }
        })
    }

    fn put_profile(&mut self, profile: ProfileEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.stage(Document::Profile(profile));
        Box::pin(async { Ok(()) })
    }

    fn couple(&mut self, id: Uuid) -> BoxFuture<'_, StorageResult<Option<CoupleEntity>>> {
        Box::pin(async move {
            match self.read(DocKey::Couple(id)).await {
                Some(Document::Couple(couple)) => Ok(Some(couple)),
                Some(_) => Err(mismatched(&id.to_string())),
                None => Ok(None),
            }
        })
    }

    fn put_couple(&mut self, couple: CoupleEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.stage(Document::Couple(couple));
        Box::pin(async { Ok(()) })
    }

    fn session(&mut self, id: Uuid) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        Box::pin(async move {
            match self.read(DocKey::Session(id)).await {
                Some(Document::Session(session)) => Ok(Some(session)),
                Some(_) => Err(mismatched(&id.to_string())),
                None => Ok(None),
            }
        })
    }

    fn put_session(&mut self, session: GameSessionEntity) -> BoxFuture<'_, StorageResult<()>> {
        self.stage(Document::Session(session));
        Box::pin(async { Ok(()) })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        let MemoryTransaction {
            documents,
            reads,
            writes,
        } = *self;

        Box::pin(async move {
            let mut guard = documents.write().await;
            if let Some((key, seen)) = reads
                .iter()
                .find(|(key, seen)| guard.version_of(key) != **seen)
            {
                debug!(?key, seen, "memory transaction invalidated by a concurrent commit");
                return Err(StorageError::conflict(format!(
                    "{key:?} changed since it was read"
                )));
            }

            for (_, document) in writes {
                guard.apply(document);
            }
            Ok(())
        })
    }

    fn abort(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

impl CoupleStore for MemoryCoupleStore {
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>> {
        let documents = self.documents.clone();
        Box::pin(async move {
            let transaction: Box<dyn StoreTransaction> = Box::new(MemoryTransaction {
                documents,
                reads: HashMap::new(),
                writes: IndexMap::new(),
            });
            Ok(transaction)
        })
    }

    fn find_invite(&self, code: String) -> BoxFuture<'static, StorageResult<Option<InviteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(match store.read(DocKey::Invite(code)).await {
                Some(Document::Invite(invite)) => Some(invite),
                _ => None,
            })
        })
    }

    fn insert_invite(&self, invite: InviteEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut guard = store.documents.write().await;
            if guard.invites.contains_key(&invite.code) {
                return Ok(false);
            }
            guard.apply(Document::Invite(invite));
            Ok(true)
        })
    }

    fn find_profile(&self, id: String) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(match store.read(DocKey::Profile(id)).await {
                Some(Document::Profile(profile)) => Some(profile),
                _ => None,
            })
        })
    }

    fn find_couple(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<CoupleEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(match store.read(DocKey::Couple(id)).await {
                Some(Document::Couple(couple)) => Some(couple),
                _ => None,
            })
        })
    }

    fn find_session(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(match store.read(DocKey::Session(id)).await {
                Some(Document::Session(session)) => Some(session),
                _ => None,
            })
        })
    }

    fn list_sessions(
        &self,
        couple_id: Uuid,
        before: Option<SystemTime>,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let guard = store.documents.read().await;
            let mut sessions = guard
                .sessions
                .values()
                .map(|doc| &doc.value)
                .filter(|session| session.couple_id == couple_id)
                .filter(|session| before.is_none_or(|cutoff| session.created_at < cutoff))
                .cloned()
                .collect::<Vec<_>>();
            sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            sessions.truncate(limit);
            Ok(sessions)
        })
    }

    fn active_questions(
        &self,
        kind: GameKind,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let guard = store.documents.read().await;
            Ok(guard
                .questions
                .values()
                .filter(|question| question.kind == kind && question.active)
                .cloned()
                .collect())
        })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .documents
                .write()
                .await
                .questions
                .insert(question.id, question);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
