//! Invite issuing, the advisory code pre-check and the atomic acceptance that creates a
//! relationship.
//!
//! [`validate_code`] only reads, outside of any transaction. Its verdict is a hint for the UI:
//! [`accept_invite`] re-reads every document it depends on inside one store transaction and
//! decides again from scratch.

use std::time::SystemTime;

use time::Date;
use tracing::{debug, info};

use crate::{
    dao::models::{CoupleEntity, InviteEntity, ProfileEntity, UserId},
    dto::{
        format_system_time,
        pairing::{AcceptInviteRequest, AcceptInviteResult, CreateInviteResult, ValidateCodeResult},
        validation::parse_anniversary,
    },
    error::{PairingError, ServiceError},
    services::{invite_code, sse_events},
    state::{
        SharedState, Tx,
        daily::Allotment,
        pairing::{check_invite, check_inviter, check_requester, pair},
    },
};

/// Codes drawn before giving up on finding a free one.
const MAX_CODE_ATTEMPTS: usize = 5;

/// Issue a fresh invite for an unpaired requester.
pub async fn create_invite(
    state: &SharedState,
    requester: Option<&str>,
) -> Result<CreateInviteResult, ServiceError> {
    let requester = requester.ok_or(PairingError::NotAuthenticated)?.to_owned();
    let now = state.now();

    {
        let requester = requester.clone();
        state
            .run_transaction("create_invite", move |tx| {
                Box::pin(ensure_unpaired_profile(tx, requester.clone(), now))
            })
            .await?;
    }

    let store = state.require_store().await?;
    let expires_at = now + state.config().invite_ttl();
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let invite = InviteEntity {
            code: invite_code::generate(),
            created_by: requester.clone(),
            created_at: now,
            expires_at,
            used: false,
            used_by: None,
            used_at: None,
        };
        let code = invite.code.clone();

        if store.insert_invite(invite).await? {
            info!(code = %code, created_by = %requester, "invite issued");
            return Ok(CreateInviteResult {
                code,
                expires_at: format_system_time(expires_at),
            });
        }
        debug!(code = %code, attempt, "invite code already taken; drawing another");
    }

    Err(ServiceError::Exhausted(
        "could not allocate a free invite code".into(),
    ))
}

async fn ensure_unpaired_profile(
    tx: &mut Tx,
    requester: UserId,
    now: SystemTime,
) -> Result<(), ServiceError> {
    let existing = tx.profile(&requester).await?;
    match existing {
        Some(profile) => Ok(check_requester(Some(&profile))?),
        None => {
            tx.put_profile(ProfileEntity::new(requester, String::new(), now))
                .await?;
            Ok(())
        }
    }
}

/// Tell the requester whether `raw_code` looks acceptable and who issued it.
///
/// The checks run in a fixed order and the first failing one is reported. Nothing is locked: the
/// answer may already be stale when the caller acts on it.
pub async fn validate_code(
    state: &SharedState,
    requester: Option<&str>,
    raw_code: &str,
) -> Result<ValidateCodeResult, ServiceError> {
    let requester = requester.ok_or(PairingError::NotAuthenticated)?;
    let code = well_formed_code(raw_code)?;

    let store = state.require_store().await?;
    let profile = store.find_profile(requester.to_owned()).await?;
    check_requester(profile.as_ref())?;

    let invite = store
        .find_invite(code)
        .await?
        .ok_or(PairingError::CodeNotFound)?;
    check_invite(&invite, requester, state.now())?;

    let inviter = check_inviter(store.find_profile(invite.created_by).await?)?;
    Ok(ValidateCodeResult {
        inviter_uid: inviter.id,
        inviter_name: inviter.display_name,
    })
}

#[derive(Clone)]
struct Acceptance {
    code: String,
    requester: UserId,
    anniversary: Date,
    today: Date,
    allotment: Allotment,
    now: SystemTime,
}

/// Consume the invite and create the relationship linking its issuer and the requester.
///
/// Every precondition of [`validate_code`] past the format check is evaluated again on the
/// transaction's own reads. When a concurrent acceptance commits first, the transaction is run
/// again and fails on whichever precondition that commit broke.
pub async fn accept_invite(
    state: &SharedState,
    requester: Option<&str>,
    raw_code: &str,
    request: AcceptInviteRequest,
) -> Result<AcceptInviteResult, ServiceError> {
    let requester = requester.ok_or(PairingError::NotAuthenticated)?;
    let code = well_formed_code(raw_code)?;
    let anniversary = parse_anniversary(&request.anniversary).ok_or_else(|| {
        ServiceError::InvalidInput("anniversary must be a valid date written DD/MM/YYYY".into())
    })?;

    let acceptance = Acceptance {
        code: code.clone(),
        requester: requester.to_owned(),
        anniversary,
        today: state.today(),
        allotment: state.config().allotment(),
        now: state.now(),
    };

    let couple = state
        .run_transaction("accept_invite", move |tx| {
            Box::pin(accept_in_transaction(tx, acceptance.clone()))
        })
        .await
        .inspect_err(|err| {
            debug!(code = %code, requester, error = %err, "invite acceptance refused");
        })?;

    info!(couple_id = %couple.id, code = %code, "relationship created");
    sse_events::broadcast_couple_paired(state, &couple);

    Ok(AcceptInviteResult {
        couple_id: couple.id,
        anniversary: couple.anniversary.to_string(),
    })
}

async fn accept_in_transaction(
    tx: &mut Tx,
    acceptance: Acceptance,
) -> Result<CoupleEntity, ServiceError> {
    let Acceptance {
        code,
        requester,
        anniversary,
        today,
        allotment,
        now,
    } = acceptance;

    let invitee = tx.profile(&requester).await?;
    check_requester(invitee.as_ref())?;

    let invite = tx
        .invite(&code)
        .await?
        .ok_or(PairingError::CodeNotFound)?;
    check_invite(&invite, &requester, now)?;

    let inviter = check_inviter(tx.profile(&invite.created_by).await?)?;
    let invitee = invitee.unwrap_or_else(|| ProfileEntity::new(requester, String::new(), now));

    let pairing = pair(invite, inviter, invitee, anniversary, today, allotment, now);
    tx.put_invite(pairing.invite).await?;
    tx.put_profile(pairing.inviter).await?;
    tx.put_profile(pairing.invitee).await?;
    tx.put_couple(pairing.couple.clone()).await?;

    Ok(pairing.couple)
}

fn well_formed_code(raw: &str) -> Result<String, PairingError> {
    let code = invite_code::normalize(raw);
    if invite_code::is_well_formed(&code) {
        Ok(code)
    } else {
        Err(PairingError::InvalidCodeFormat)
    }
}
