use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::couple::CoupleView,
    error::AppError,
    routes::extract::Requester,
    services::{couple_service, sse_service},
    state::SharedState,
};

/// Relationship status and its event stream.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/couples/me", get(get_couple))
        .route("/couples/me/events", get(couple_events))
}

/// The caller's relationship, with counters as of today.
#[utoipa::path(
    get,
    path = "/couples/me",
    tag = "couples",
    params(("x-user-id" = String, Header, description = "User id verified by the gateway")),
    responses(
        (status = 200, description = "Relationship status", body = CoupleView),
        (status = 409, description = "Caller not paired")
    )
)]
pub async fn get_couple(
    State(state): State<SharedState>,
    requester: Requester,
) -> Result<Json<CoupleView>, AppError> {
    Ok(Json(couple_service::get_couple(&state, requester.id()).await?))
}

/// Stream pairing and session events of the caller's relationship.
#[utoipa::path(
    get,
    path = "/couples/me/events",
    tag = "sse",
    params(("x-user-id" = String, Header, description = "User id verified by the gateway")),
    responses(
        (status = 200, description = "Relationship SSE stream", content_type = "text/event-stream", body = String),
        (status = 409, description = "Caller not paired")
    )
)]
pub async fn couple_events(
    State(state): State<SharedState>,
    requester: Requester,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe_couple(&state, requester.id()).await?;
    info!(couple_id = %subscription.couple_id, "new couple SSE connection");
    Ok(sse_service::to_sse_stream(state, subscription))
}
