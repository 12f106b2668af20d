use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::pairing::{AcceptInviteRequest, AcceptInviteResult, CreateInviteResult, ValidateCodeResult},
    error::AppError,
    routes::extract::Requester,
    services::pairing_service,
    state::SharedState,
};

/// Invite lifecycle: issue, pre-check, accept.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/invites", post(create_invite))
        .route("/invites/{code}", get(validate_code))
        .route("/invites/{code}/accept", post(accept_invite))
}

/// Issue a single-use invite code for the caller.
#[utoipa::path(
    post,
    path = "/invites",
    tag = "pairing",
    params(("x-user-id" = String, Header, description = "User id verified by the gateway")),
    responses(
        (status = 200, description = "Invite issued", body = CreateInviteResult),
        (status = 409, description = "Caller already paired"),
        (status = 503, description = "No free code found or storage unavailable")
    )
)]
pub async fn create_invite(
    State(state): State<SharedState>,
    requester: Requester,
) -> Result<Json<CreateInviteResult>, AppError> {
    let invite = pairing_service::create_invite(&state, requester.id()).await?;
    Ok(Json(invite))
}

/// Advisory check of an invite code before asking for the anniversary.
#[utoipa::path(
    get,
    path = "/invites/{code}",
    tag = "pairing",
    params(
        ("code" = String, Path, description = "Six-symbol invite code"),
        ("x-user-id" = String, Header, description = "User id verified by the gateway")
    ),
    responses(
        (status = 200, description = "Code currently acceptable", body = ValidateCodeResult),
        (status = 400, description = "Malformed code"),
        (status = 404, description = "Unknown code"),
        (status = 409, description = "Code expired, used, self-issued, or a party already paired")
    )
)]
pub async fn validate_code(
    State(state): State<SharedState>,
    requester: Requester,
    Path(code): Path<String>,
) -> Result<Json<ValidateCodeResult>, AppError> {
    let result = pairing_service::validate_code(&state, requester.id(), &code).await?;
    Ok(Json(result))
}

/// Accept an invite and create the relationship.
#[utoipa::path(
    post,
    path = "/invites/{code}/accept",
    tag = "pairing",
    params(
        ("code" = String, Path, description = "Six-symbol invite code"),
        ("x-user-id" = String, Header, description = "User id verified by the gateway")
    ),
    request_body = AcceptInviteRequest,
    responses(
        (status = 200, description = "Relationship created", body = AcceptInviteResult),
        (status = 400, description = "Malformed code or anniversary"),
        (status = 404, description = "Unknown code"),
        (status = 409, description = "Precondition failed or lost a concurrent acceptance")
    )
)]
pub async fn accept_invite(
    State(state): State<SharedState>,
    requester: Requester,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<AcceptInviteRequest>>,
) -> Result<Json<AcceptInviteResult>, AppError> {
    let result = pairing_service::accept_invite(&state, requester.id(), &code, payload).await?;
    Ok(Json(result))
}
