use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::{
    dao::{couple_store::CoupleStore, storage::StorageError},
    services::question_source,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect the store, seed the question catalogue and keep watching the connection.
///
/// The shared state stays in degraded mode until the first connection succeeds, and goes back to
/// it whenever health checks fail and reconnection attempts run out.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn CoupleStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                let seeds = state.config().questions();
                if let Err(err) = question_source::seed(store.as_ref(), seeds).await {
                    error!(error = %err, "failed to seed the question catalogue");
                }
                state.install_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch(&state, store.as_ref()).await;
                state.clear_store().await;
                warn!("storage lost; entering degraded mode until it reconnects");
            }
            Err(err) => warn!(error = %err, "storage connection attempt failed"),
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll the store until it fails and cannot be reconnected.
async fn watch(state: &SharedState, store: &dyn CoupleStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed; entering degraded mode");
                state.update_degraded(true).await;
                if !reconnect(store).await {
                    warn!("exhausted storage reconnect attempts");
                    return;
                }
                state.update_degraded(false).await;
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(store: &dyn CoupleStore) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, dao::couple_store::memory::MemoryCoupleStore, state::AppState};

    #[tokio::test]
    async fn connecting_seeds_questions_and_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);

        let supervisor = tokio::spawn(run(state.clone(), || async {
            Ok(Arc::new(MemoryCoupleStore::new()) as Arc<dyn CoupleStore>)
        }));

        let mut watcher = state.degraded_watcher();
        while *watcher.borrow_and_update() {
            watcher.changed().await.unwrap();
        }

        let store = state.require_store().await.unwrap();
        let daily = store
            .active_questions(crate::dao::models::GameKind::Daily)
            .await
            .unwrap();
        assert!(!daily.is_empty());

        supervisor.abort();
    }
}
