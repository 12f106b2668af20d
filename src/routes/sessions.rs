use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{
        HistoryPage, HistoryQuery, StartSessionRequest, StartSessionResult, SubmitAnswerRequest,
        SubmitAnswerResult,
    },
    error::AppError,
    routes::extract::Requester,
    services::game_service,
    state::SharedState,
};

/// Game sessions: start, answer, browse.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(start_session))
        .route("/sessions/history", get(history))
        .route("/sessions/{id}/answers", post(submit_answer))
}

/// Start a session of the requested game type, consuming one unit of today's allotment.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    params(("x-user-id" = String, Header, description = "User id verified by the gateway")),
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Session started, or refused with a message", body = StartSessionResult),
        (status = 409, description = "Caller not paired")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    requester: Requester,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResult>, AppError> {
    let result = game_service::start_session(&state, requester.id(), payload).await?;
    Ok(Json(result))
}

/// Record the caller's answer to a session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/answers",
    tag = "sessions",
    params(
        ("id" = Uuid, Path, description = "Session identifier"),
        ("x-user-id" = String, Header, description = "User id verified by the gateway")
    ),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = SubmitAnswerResult),
        (status = 400, description = "Answer does not fit the game type"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Caller is not a member, or lost a concurrent update")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    requester: Requester,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResult>, AppError> {
    let result = game_service::submit_answer(&state, requester.id(), id, payload).await?;
    Ok(Json(result))
}

/// Sessions of the caller's relationship, newest first.
#[utoipa::path(
    get,
    path = "/sessions/history",
    tag = "sessions",
    params(
        HistoryQuery,
        ("x-user-id" = String, Header, description = "User id verified by the gateway")
    ),
    responses(
        (status = 200, description = "One page of history", body = HistoryPage),
        (status = 409, description = "Caller not paired")
    )
)]
pub async fn history(
    State(state): State<SharedState>,
    requester: Requester,
    Valid(Query(query)): Valid<Query<HistoryQuery>>,
) -> Result<Json<HistoryPage>, AppError> {
    Ok(Json(
        game_service::history(&state, requester.id(), query).await?,
    ))
}
