use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    ClientSession, Collection, Database, IndexModel,
    bson::{DateTime, doc},
    options::{IndexOptions, ReadConcern, WriteConcern},
};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key, is_unknown_commit_result},
    models::{
        COUPLE_COLLECTION, INVITE_COLLECTION, MongoCoupleDocument, MongoInviteDocument,
        MongoProfileDocument, MongoQuestionDocument, MongoSessionDocument, PROFILE_COLLECTION,
        QUESTION_COLLECTION, SESSION_COLLECTION, by_id,
    },
};
use crate::dao::{
    couple_store::{CoupleStore, StoreTransaction},
    models::{
        CoupleEntity, GameKind, GameSessionEntity, InviteEntity, ProfileEntity, QuestionEntity,
    },
    storage::{StorageError, StorageResult},
};

/// Times `commitTransaction` is sent before an unknown result is reported as such.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// MongoDB-backed [`CoupleStore`] relying on multi-document transactions.
///
/// Transactions need a replica set (or sharded cluster); a standalone server rejects them.
#[derive(Clone)]
pub struct MongoCoupleStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: mongodb::Client,
    database: Database,
}

/// Typed handles on every collection, cloned into each transaction.
#[derive(Clone)]
struct Collections {
    invites: Collection<MongoInviteDocument>,
    profiles: Collection<MongoProfileDocument>,
    couples: Collection<MongoCoupleDocument>,
    sessions: Collection<MongoSessionDocument>,
    questions: Collection<MongoQuestionDocument>,
}

impl Collections {
    fn new(database: &Database) -> Self {
        Self {
            invites: database.collection(INVITE_COLLECTION),
            profiles: database.collection(PROFILE_COLLECTION),
            couples: database.collection(COUPLE_COLLECTION),
            sessions: database.collection(SESSION_COLLECTION),
            questions: database.collection(QUESTION_COLLECTION),
        }
    }
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoCoupleStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collections = self.collections().await;

        let session_index = IndexModel::builder()
            .keys(doc! { "couple_id": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name(Some("session_couple_created_idx".to_owned()))
                    .build(),
            )
            .build();
        collections
            .sessions
            .create_index(session_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION,
                index: "couple_id,created_at",
                source,
            })?;

        let question_index = IndexModel::builder()
            .keys(doc! { "kind": 1, "active": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("question_kind_active_idx".to_owned()))
                    .build(),
            )
            .build();
        collections
            .questions
            .create_index(question_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: QUESTION_COLLECTION,
                index: "kind,active",
                source,
            })?;

        Ok(())
    }

    async fn collections(&self) -> Collections {
        let guard = self.inner.state.read().await;
        Collections::new(&guard.database)
    }

    async fn client(&self) -> mongodb::Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn begin(&self) -> MongoResult<MongoTransaction> {
        let client = self.client().await;
        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::StartTransaction { source })?;
        session
            .start_transaction()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::majority())
            .await
            .map_err(|source| MongoDaoError::StartTransaction { source })?;

        Ok(MongoTransaction {
            session,
            collections: self.collections().await,
        })
    }

    async fn find_invite(&self, code: String) -> MongoResult<Option<InviteEntity>> {
        let collections = self.collections().await;
        let document = collections
            .invites
            .find_one(by_id(&code))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: INVITE_COLLECTION,
                id: code,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn insert_invite(&self, invite: InviteEntity) -> MongoResult<bool> {
        let code = invite.code.clone();
        let document: MongoInviteDocument = invite.into();
        let collections = self.collections().await;
        match collections.invites.insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::Save {
                collection: INVITE_COLLECTION,
                id: code,
                source,
            }),
        }
    }

    async fn find_profile(&self, id: String) -> StorageResult<Option<ProfileEntity>> {
        let collections = self.collections().await;
        let document = collections
            .profiles
            .find_one(by_id(&id))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: PROFILE_COLLECTION,
                id,
                source,
            })?;
        document.map(TryInto::try_into).transpose()
    }

    async fn find_couple(&self, id: Uuid) -> StorageResult<Option<CoupleEntity>> {
        let key = id.to_string();
        let collections = self.collections().await;
        let document = collections
            .couples
            .find_one(by_id(&key))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: COUPLE_COLLECTION,
                id: key,
                source,
            })?;
        document.map(TryInto::try_into).transpose()
    }

    async fn find_session(&self, id: Uuid) -> StorageResult<Option<GameSessionEntity>> {
        let key = id.to_string();
        let collections = self.collections().await;
        let document = collections
            .sessions
            .find_one(by_id(&key))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: SESSION_COLLECTION,
                id: key,
                source,
            })?;
        document.map(TryInto::try_into).transpose()
    }

    async fn list_sessions(
        &self,
        couple_id: Uuid,
        before: Option<SystemTime>,
        limit: usize,
    ) -> StorageResult<Vec<GameSessionEntity>> {
        let mut filter = doc! { "couple_id": couple_id.to_string() };
        if let Some(cutoff) = before {
            filter.insert("created_at", doc! { "$lt": DateTime::from_system_time(cutoff) });
        }

        let collections = self.collections().await;
        let documents: Vec<MongoSessionDocument> = collections
            .sessions
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: SESSION_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: SESSION_COLLECTION,
                source,
            })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn active_questions(&self, kind: GameKind) -> StorageResult<Vec<QuestionEntity>> {
        let collections = self.collections().await;
        let documents: Vec<MongoQuestionDocument> = collections
            .questions
            .find(doc! { "kind": kind.as_str(), "active": true })
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: QUESTION_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: QUESTION_COLLECTION,
                source,
            })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn save_question(&self, question: QuestionEntity) -> MongoResult<()> {
        let id = question.id.to_string();
        let document: MongoQuestionDocument = question.into();
        let collections = self.collections().await;
        collections
            .questions
            .replace_one(by_id(&id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: QUESTION_COLLECTION,
                id,
                source,
            })?;
        Ok(())
    }
}

/// Open server-side transaction bound to one client session.
pub struct MongoTransaction {
    session: ClientSession,
    collections: Collections,
}

impl MongoTransaction {
    async fn invite(&mut self, code: &str) -> MongoResult<Option<InviteEntity>> {
        let document = self
            .collections
            .invites
            .find_one(by_id(code))
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: INVITE_COLLECTION,
                id: code.to_owned(),
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn put_invite(&mut self, invite: InviteEntity) -> MongoResult<()> {
        let code = invite.code.clone();
        let document: MongoInviteDocument = invite.into();
        self.collections
            .invites
            .replace_one(by_id(&code), &document)
            .upsert(true)
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: INVITE_COLLECTION,
                id: code,
                source,
            })?;
        Ok(())
    }

    async fn profile(&mut self, id: &str) -> StorageResult<Option<ProfileEntity>> {
        let document = self
            .collections
            .profiles
            .find_one(by_id(id))
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: PROFILE_COLLECTION,
                id: id.to_owned(),
                source,
            })?;
        document.map(TryInto::try_into).transpose()
    }

    async fn put_profile(&mut self, profile: ProfileEntity) -> MongoResult<()> {
        let id = profile.id.clone();
        let document: MongoProfileDocument = profile.into();
        self.collections
            .profiles
            .replace_one(by_id(&id), &document)
            .upsert(true)
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: PROFILE_COLLECTION,
                id,
                source,
            })?;
        Ok(())
    }

    async fn couple(&mut self, id: Uuid) -> StorageResult<Option<CoupleEntity>> {
        let key = id.to_string();
        let document = self
            .collections
            .couples
            .find_one(by_id(&key))
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: COUPLE_COLLECTION,
                id: key,
                source,
            })?;
        document.map(TryInto::try_into).transpose()
    }

    async fn put_couple(&mut self, couple: CoupleEntity) -> MongoResult<()> {
        let key = couple.id.to_string();
        let document: MongoCoupleDocument = couple.into();
        self.collections
            .couples
            .replace_one(by_id(&key), &document)
            .upsert(true)
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: COUPLE_COLLECTION,
                id: key,
                source,
            })?;
        Ok(())
    }

    async fn session_document(&mut self, id: Uuid) -> StorageResult<Option<GameSessionEntity>> {
        let key = id.to_string();
        let document = self
            .collections
            .sessions
            .find_one(by_id(&key))
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: SESSION_COLLECTION,
                id: key,
                source,
            })?;
        document.map(TryInto::try_into).transpose()
    }

    async fn put_session(&mut self, session: GameSessionEntity) -> MongoResult<()> {
        let key = session.id.to_string();
        let document: MongoSessionDocument = session.into();
        self.collections
            .sessions
            .replace_one(by_id(&key), &document)
            .upsert(true)
            .session(&mut self.session)
            .await
            .map_err(|source| MongoDaoError::Save {
                collection: SESSION_COLLECTION,
                id: key,
                source,
            })?;
        Ok(())
    }
}

impl StoreTransaction for MongoTransaction {
    fn invite<'a>(
        &'a mut self,
        code: &'a str,
    ) -> BoxFuture<'a, StorageResult<Option<InviteEntity>>> {
        Box::pin(async move {
            MongoTransaction::invite(self, code)
                .await
                .map_err(StorageError::from)
        })
    }

    fn put_invite(&mut self, invite: InviteEntity) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            MongoTransaction::put_invite(self, invite)
                .await
                .map_err(StorageError::from)
        })
    }

    fn profile<'a>(
        &'a mut self,
        id: &'a str,
    ) -> BoxFuture<'a, StorageResult<Option<ProfileEntity>>> {
        Box::pin(MongoTransaction::profile(self, id))
    }

    fn put_profile(&mut self, profile: ProfileEntity) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            MongoTransaction::put_profile(self, profile)
                .await
                .map_err(StorageError::from)
        })
    }

    fn couple(&mut self, id: Uuid) -> BoxFuture<'_, StorageResult<Option<CoupleEntity>>> {
        Box::pin(MongoTransaction::couple(self, id))
    }

    fn put_couple(&mut self, couple: CoupleEntity) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            MongoTransaction::put_couple(self, couple)
                .await
                .map_err(StorageError::from)
        })
    }

    fn session(&mut self, id: Uuid) -> BoxFuture<'_, StorageResult<Option<GameSessionEntity>>> {
        Box::pin(self.session_document(id))
    }

    fn put_session(&mut self, session: GameSessionEntity) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            MongoTransaction::put_session(self, session)
                .await
                .map_err(StorageError::from)
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        let mut transaction = *self;
        Box::pin(async move {
            let mut attempt = 1;
            loop {
                match transaction.session.commit_transaction().await {
                    Ok(()) => return Ok(()),
                    Err(err) if is_unknown_commit_result(&err) && attempt < MAX_COMMIT_ATTEMPTS => {
                        debug!(attempt, error = %err, "commit result unknown; sending commit again");
                        attempt += 1;
                    }
                    Err(source) => {
                        return Err(StorageError::from(MongoDaoError::Commit { source }));
                    }
                }
            }
        })
    }

    fn abort(self: Box<Self>) -> BoxFuture<'static, StorageResult<()>> {
        let mut transaction = *self;
        Box::pin(async move {
            if let Err(err) = transaction.session.abort_transaction().await {
                warn!(error = %err, "failed to abort MongoDB transaction");
            }
            Ok(())
        })
    }
}

impl CoupleStore for MongoCoupleStore {
    fn begin(&self) -> BoxFuture<'static, StorageResult<Box<dyn StoreTransaction>>> {
        let store = self.clone();
        Box::pin(async move {
            let transaction: Box<dyn StoreTransaction> = Box::new(store.begin().await?);
            Ok(transaction)
        })
    }

    fn find_invite(&self, code: String) -> BoxFuture<'static, StorageResult<Option<InviteEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_invite(code).await.map_err(StorageError::from) })
    }

    fn insert_invite(&self, invite: InviteEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_invite(invite).await.map_err(StorageError::from) })
    }

    fn find_profile(&self, id: String) -> BoxFuture<'static, StorageResult<Option<ProfileEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_profile(id).await })
    }

    fn find_couple(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<CoupleEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_couple(id).await })
    }

    fn find_session(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(id).await })
    }

    fn list_sessions(
        &self,
        couple_id: Uuid,
        before: Option<SystemTime>,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<GameSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_sessions(couple_id, before, limit).await })
    }

    fn active_questions(
        &self,
        kind: GameKind,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.active_questions(kind).await })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_question(question).await.map_err(StorageError::from) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(StorageError::from) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(StorageError::from) })
    }
}
