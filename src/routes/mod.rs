use axum::Router;

use crate::state::SharedState;

/// Token-guarded maintenance routes.
pub mod admin;
/// Relationship status and its event stream.
pub mod couple;
/// Swagger UI and the OpenAPI document.
pub mod docs;
/// Extractors for gateway-provided identity.
pub mod extract;
/// Liveness probe.
pub mod health;
/// Invite issuing, validation and acceptance.
pub mod invites;
/// The caller's own profile.
pub mod profile;
/// Game sessions and history.
pub mod sessions;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(profile::router())
        .merge(invites::router())
        .merge(couple::router())
        .merge(sessions::router())
        .merge(admin::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
