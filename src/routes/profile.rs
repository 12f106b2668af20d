use axum::{Json, Router, extract::State, routing::get};
use axum_valid::Valid;

use crate::{
    dto::profile::{ProfileView, UpsertProfileRequest},
    error::AppError,
    routes::extract::Requester,
    services::profile_service,
    state::SharedState,
};

/// Routes managing the caller's own profile.
pub fn router() -> Router<SharedState> {
    Router::new().route("/profiles/me", get(get_profile).put(upsert_profile))
}

/// Create or rename the caller's profile.
#[utoipa::path(
    put,
    path = "/profiles/me",
    tag = "profiles",
    params(("x-user-id" = String, Header, description = "User id verified by the gateway")),
    request_body = UpsertProfileRequest,
    responses(
        (status = 200, description = "Profile saved", body = ProfileView),
        (status = 400, description = "Invalid display name"),
        (status = 401, description = "Missing user id")
    )
)]
pub async fn upsert_profile(
    State(state): State<SharedState>,
    requester: Requester,
    Valid(Json(payload)): Valid<Json<UpsertProfileRequest>>,
) -> Result<Json<ProfileView>, AppError> {
    let profile = profile_service::upsert_profile(&state, requester.id(), payload).await?;
    Ok(Json(profile))
}

/// Return the caller's profile.
#[utoipa::path(
    get,
    path = "/profiles/me",
    tag = "profiles",
    params(("x-user-id" = String, Header, description = "User id verified by the gateway")),
    responses(
        (status = 200, description = "Caller's profile", body = ProfileView),
        (status = 404, description = "No profile yet")
    )
)]
pub async fn get_profile(
    State(state): State<SharedState>,
    requester: Requester,
) -> Result<Json<ProfileView>, AppError> {
    Ok(Json(
        profile_service::get_profile(&state, requester.id()).await?,
    ))
}
