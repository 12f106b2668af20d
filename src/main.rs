//! PairPlay Back binary entrypoint wiring REST, SSE and the storage supervisor.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pairplay_back::{
    config::AppConfig,
    dao::couple_store::{CoupleStore, memory::MemoryCoupleStore},
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

/// Storage backends selectable through `STORE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Memory,
    #[cfg(feature = "mongo-store")]
    Mongo,
}

impl Backend {
    fn from_env() -> Self {
        match env::var("STORE_BACKEND").ok().as_deref().map(str::trim) {
            Some("memory") => Backend::Memory,
            #[cfg(feature = "mongo-store")]
            Some("mongo") | None => Backend::Mongo,
            #[cfg(not(feature = "mongo-store"))]
            None => Backend::Memory,
            Some(other) => {
                warn!(backend = other, "unknown STORE_BACKEND; using the default");
                Self::default_backend()
            }
        }
    }

    fn default_backend() -> Self {
        #[cfg(feature = "mongo-store")]
        {
            Backend::Mongo
        }
        #[cfg(not(feature = "mongo-store"))]
        {
            Backend::Memory
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    let backend = Backend::from_env();
    info!(?backend, "selected storage backend");
    spawn_storage_supervisor(app_state.clone(), backend);

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Run the storage supervisor in the background for the selected backend.
fn spawn_storage_supervisor(state: SharedState, backend: Backend) {
    match backend {
        Backend::Memory => {
            let store: Arc<dyn CoupleStore> = Arc::new(MemoryCoupleStore::new());
            tokio::spawn(storage_supervisor::run(state, move || {
                let store = store.clone();
                async move { Ok(store) }
            }));
        }
        #[cfg(feature = "mongo-store")]
        Backend::Mongo => {
            use pairplay_back::dao::{
                couple_store::mongodb::{MongoConfig, MongoCoupleStore},
                storage::StorageError,
            };

            let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
            let db_name = env::var("MONGO_DB").ok();
            tokio::spawn(storage_supervisor::run(state, move || {
                let uri = uri.clone();
                let db_name = db_name.clone();
                async move {
                    let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
                    let store = MongoCoupleStore::connect(config).await?;
                    Ok::<Arc<dyn CoupleStore>, StorageError>(Arc::new(store))
                }
            }));
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
