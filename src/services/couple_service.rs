use crate::{
    dto::couple::CoupleView,
    error::{GameError, ServiceError},
    services::{game_service::couple_of, profile_service::authenticated},
    state::{SharedState, daily},
};

/// The requester's relationship with today's counters.
///
/// A stale record is shown as it will look after its next reset; the stored record itself is only
/// reset by the transactions that consume its counters.
pub async fn get_couple(
    state: &SharedState,
    requester: Option<&str>,
) -> Result<CoupleView, ServiceError> {
    let requester = authenticated(requester)?;
    let couple_id = couple_of(state, requester).await?;
    let store = state.require_store().await?;
    let couple = store
        .find_couple(couple_id)
        .await?
        .ok_or(GameError::RelationshipNotFound)?;

    let today = daily::reset(&couple, state.today(), state.config().allotment());
    Ok(CoupleView::new(today, requester))
}
