use tracing::debug;

use crate::{
    dao::models::ProfileEntity,
    dto::profile::{ProfileView, UpsertProfileRequest},
    error::ServiceError,
    state::SharedState,
};

/// Create the requester's profile, or rename it.
///
/// Runs as a transaction so that a rename racing with a pairing cannot write back a stale
/// `couple_id`.
pub async fn upsert_profile(
    state: &SharedState,
    requester: Option<&str>,
    request: UpsertProfileRequest,
) -> Result<ProfileView, ServiceError> {
    let requester = authenticated(requester)?.to_owned();
    let display_name = request.display_name.trim().to_owned();
    let now = state.now();

    let profile = state
        .run_transaction("upsert_profile", move |tx| {
            let requester = requester.clone();
            let display_name = display_name.clone();
            Box::pin(async move {
                let existing = tx.profile(&requester).await?;
                let profile = match existing {
                    Some(existing) => ProfileEntity {
                        display_name,
                        ..existing
                    },
                    None => ProfileEntity::new(requester, display_name, now),
                };
                tx.put_profile(profile.clone()).await?;
                Ok::<_, ServiceError>(profile)
            })
        })
        .await?;

    debug!(user_id = %profile.id, "profile saved");
    Ok(profile.into())
}

/// Load the caller's profile.
pub async fn get_profile(
    state: &SharedState,
    requester: Option<&str>,
) -> Result<ProfileView, ServiceError> {
    let requester = authenticated(requester)?;
    let store = state.require_store().await?;
    store
        .find_profile(requester.to_owned())
        .await?
        .map(ProfileView::from)
        .ok_or_else(|| ServiceError::NotFound(format!("profile `{requester}` not found")))
}

pub(crate) fn authenticated(requester: Option<&str>) -> Result<&str, ServiceError> {
    requester.ok_or_else(|| ServiceError::Unauthorized("missing `x-user-id` header".into()))
}
