/// Time sources.
pub mod clock;
pub mod daily;
/// Answer parsing and session completion rules.
pub mod game;
pub mod pairing;
mod sse;

use std::{sync::Arc, time::Duration, time::SystemTime};

use futures::future::BoxFuture;
use time::Date;
use tokio::sync::{RwLock, watch};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::{
    config::AppConfig,
    dao::couple_store::{CoupleStore, StoreTransaction},
    error::ServiceError,
};

pub use self::sse::{CoupleHubs, SseHub};
use self::clock::{Clock, SystemClock};

/// Reference-counted handle shared by handlers and background tasks.
pub type SharedState = Arc<AppState>;
/// Open transaction handed to the work of [`AppState::run_transaction`].
pub type Tx = Box<dyn StoreTransaction>;

/// Time a transaction's work may take before it is aborted.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5);
/// Executions of one transactional operation before a conflict is surfaced to the caller.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 5;
const COUPLE_HUB_CAPACITY: usize = 16;

/// Central application state storing the store handle, configuration and event hubs.
pub struct AppState {
    store: RwLock<Option<Arc<dyn CoupleStore>>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
    clock: Arc<dyn Clock>,
    hubs: CoupleHubs,
    transaction_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit time source.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            config,
            clock,
            hubs: CoupleHubs::new(COUPLE_HUB_CAPACITY),
            transaction_timeout: Some(DEFAULT_TRANSACTION_TIMEOUT),
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn CoupleStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] when none is usable.
    pub async fn require_store(&self) -> Result<Arc<dyn CoupleStore>, ServiceError> {
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn CoupleStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Immutable configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Current instant of the injected clock.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Civil date of "now" in the configured timezone.
    pub fn today(&self) -> Date {
        daily::civil_date(self.now(), self.config.timezone_offset())
    }

    /// Per-relationship SSE hubs.
    pub fn couple_hubs(&self) -> &CoupleHubs {
        &self.hubs
    }

    /// Run `work` inside a store transaction and commit it.
    ///
    /// The transaction is aborted when `work` fails or exceeds the timeout. When the commit (or
    /// a write) loses against a concurrent transaction, `work` runs again on fresh reads, so every
    /// precondition it checks is re-evaluated; after [`MAX_TRANSACTION_ATTEMPTS`] the conflict
    /// is returned as [`ServiceError::Conflict`]. A commit whose outcome is unknown may already be
    /// applied and is reported as [`ServiceError::OutcomeUnknown`] without running `work` again.
    pub async fn run_transaction<T, F>(
        &self,
        label: &'static str,
        mut work: F,
    ) -> Result<T, ServiceError>
    where
        F: for<'t> FnMut(&'t mut Tx) -> BoxFuture<'t, Result<T, ServiceError>>,
    {
        let store = self.require_store().await?;
        let mut attempt = 1;

        loop {
            match self.attempt_transaction(store.as_ref(), label, &mut work).await {
                Err(ServiceError::Conflict) if attempt < MAX_TRANSACTION_ATTEMPTS => {
                    debug!(label, attempt, "transaction conflict; running again");
                    attempt += 1;
                }
                Err(ServiceError::Conflict) => {
                    warn!(label, attempt, "transaction conflict; giving up");
                    return Err(ServiceError::Conflict);
                }
                Err(ServiceError::OutcomeUnknown) => {
                    error!(label, attempt, "commit outcome unknown; not running again");
                    return Err(ServiceError::OutcomeUnknown);
                }
                outcome => return outcome,
            }
        }
    }

    async fn attempt_transaction<T, F>(
        &self,
        store: &dyn CoupleStore,
        label: &'static str,
        work: &mut F,
    ) -> Result<T, ServiceError>
    where
        F: for<'t> FnMut(&'t mut Tx) -> BoxFuture<'t, Result<T, ServiceError>>,
    {
        let mut tx = store.begin().await?;

        let outcome = match self.transaction_timeout {
            Some(limit) => match timeout(limit, work(&mut tx)).await {
                Ok(result) => result,
                Err(_) => {
                    abort(tx, label, "timeout").await;
                    return Err(ServiceError::Timeout);
                }
            },
            None => work(&mut tx).await,
        };

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                abort(tx, label, "work error").await;
                Err(err)
            }
        }
    }
}

async fn abort(tx: Tx, label: &'static str, cause: &'static str) {
    if let Err(err) = tx.abort().await {
        warn!(label, cause, error = %err, "failed to abort transaction");
    }
}
