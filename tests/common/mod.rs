#![allow(dead_code)]

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use pairplay_back::{
    config::AppConfig,
    dao::{
        couple_store::{CoupleStore, memory::MemoryCoupleStore},
        models::{CoupleEntity, InviteEntity},
    },
    dto::{
        game::{SessionView, StartSessionRequest},
        pairing::AcceptInviteRequest,
        profile::UpsertProfileRequest,
    },
    services::{game_service, pairing_service, profile_service, question_source},
    state::{AppState, SharedState, clock::ManualClock},
};
use time::macros::datetime;
use uuid::Uuid;

pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

pub fn start() -> SystemTime {
    datetime!(2024-06-01 10:00 UTC).into()
}

pub struct Harness {
    pub state: SharedState,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryCoupleStore>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_json(json: &str) -> Self {
        Self::with_config(AppConfig::from_json(json).unwrap()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let clock = Arc::new(ManualClock::new(start()));
        let state = AppState::with_clock(config, clock.clone());
        let store = Arc::new(MemoryCoupleStore::new());
        question_source::seed(store.as_ref(), state.config().questions())
            .await
            .unwrap();
        state.install_store(store.clone()).await;
        Self {
            state,
            clock,
            store,
        }
    }

    pub async fn profile(&self, id: &str, name: &str) {
        profile_service::upsert_profile(
            &self.state,
            Some(id),
            UpsertProfileRequest {
                display_name: name.into(),
            },
        )
        .await
        .unwrap();
    }

    /// Store an invite with a known code, valid for a day from now.
    pub async fn invite(&self, code: &str, created_by: &str) {
        let now = self.state.now();
        let stored = self
            .store
            .insert_invite(InviteEntity {
                code: code.into(),
                created_by: created_by.into(),
                created_at: now,
                expires_at: now + DAY,
                used: false,
                used_by: None,
                used_at: None,
            })
            .await
            .unwrap();
        assert!(stored);
    }

    pub async fn accept(&self, code: &str, requester: &str) -> Uuid {
        pairing_service::accept_invite(
            &self.state,
            Some(requester),
            code,
            AcceptInviteRequest {
                anniversary: "14/02/2024".into(),
            },
        )
        .await
        .unwrap()
        .couple_id
    }

    /// Pair `inviter` and `invitee` through a freshly issued invite.
    pub async fn pair(&self, inviter: &str, invitee: &str) -> Uuid {
        self.profile(inviter, &capitalize(inviter)).await;
        self.profile(invitee, &capitalize(invitee)).await;
        let invite = pairing_service::create_invite(&self.state, Some(inviter))
            .await
            .unwrap();
        self.accept(&invite.code, invitee).await
    }

    pub async fn couple(&self, id: Uuid) -> CoupleEntity {
        self.store.find_couple(id).await.unwrap().unwrap()
    }

    pub async fn start(
        &self,
        requester: &str,
        kind: pairplay_back::dao::models::GameKind,
    ) -> Option<SessionView> {
        game_service::start_session(&self.state, Some(requester), StartSessionRequest { kind })
            .await
            .unwrap()
            .session
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
