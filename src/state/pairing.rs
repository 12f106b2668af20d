//! Invite acceptance rules shared by the advisory pre-check and the accepting transaction.

use std::time::SystemTime;

use time::Date;
use uuid::Uuid;

use crate::{
    dao::models::{CoupleEntity, InviteEntity, ProfileEntity},
    error::{PairedParty, PairingError},
    state::daily::Allotment,
};

/// Requester-side check: a profile that already belongs to a couple cannot pair again.
///
/// A missing profile counts as unpaired.
pub fn check_requester(profile: Option<&ProfileEntity>) -> Result<(), PairingError> {
    match profile {
        Some(profile) if profile.is_paired() => {
            Err(PairingError::AlreadyPaired(PairedParty::Requester))
        }
        _ => Ok(()),
    }
}

/// Invite-side checks, in order: expiry, single use, self invite.
pub fn check_invite(
    invite: &InviteEntity,
    requester: &str,
    now: SystemTime,
) -> Result<(), PairingError> {
    if now >= invite.expires_at {
        return Err(PairingError::CodeExpired);
    }
    if invite.used {
        return Err(PairingError::CodeAlreadyUsed);
    }
    if invite.created_by == requester {
        return Err(PairingError::SelfInvite);
    }
    Ok(())
}

/// Inviter-side check: the profile must exist and still be free.
pub fn check_inviter(profile: Option<ProfileEntity>) -> Result<ProfileEntity, PairingError> {
    match profile {
        None => Err(PairingError::InviterMissing),
        Some(profile) if profile.is_paired() => {
            Err(PairingError::AlreadyPaired(PairedParty::Inviter))
        }
        Some(profile) => Ok(profile),
    }
}

/// Every document an accepted invite writes, built from already-checked inputs.
#[derive(Debug, Clone)]
pub struct Pairing {
    /// New relationship.
    pub couple: CoupleEntity,
    /// Inviter linked to the relationship.
    pub inviter: ProfileEntity,
    /// Accepting partner linked to the relationship.
    pub invitee: ProfileEntity,
    /// Invite marked as used.
    pub invite: InviteEntity,
}

/// Link `inviter` and `invitee` through a fresh couple and consume `invite`.
pub fn pair(
    invite: InviteEntity,
    inviter: ProfileEntity,
    invitee: ProfileEntity,
    anniversary: Date,
    today: Date,
    allotment: Allotment,
    now: SystemTime,
) -> Pairing {
    let couple = CoupleEntity {
        id: Uuid::new_v4(),
        members: [inviter.id.clone(), invitee.id.clone()],
        created_at: now,
        anniversary,
        daily_remaining: allotment.daily,
        tickets_remaining: allotment.tickets,
        streak: 0,
        last_reset_date: today,
        last_streak_date: None,
    };

    let link = |mut profile: ProfileEntity| {
        profile.couple_id = Some(couple.id);
        profile.paired_at = Some(now);
        profile
    };
    let inviter = link(inviter);
    let invitee = link(invitee);

    let invite = InviteEntity {
        used: true,
        used_by: Some(invitee.id.clone()),
        used_at: Some(now),
        ..invite
    };

    Pairing {
        couple,
        inviter,
        invitee,
        invite,
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use time::macros::date;

    use super::*;

    fn invite(created_by: &str) -> InviteEntity {
        InviteEntity {
            code: "ABC123".into(),
            created_by: created_by.into(),
            created_at: UNIX_EPOCH,
            expires_at: UNIX_EPOCH + Duration::from_secs(3_600),
            used: false,
            used_by: None,
            used_at: None,
        }
    }

    fn profile(id: &str) -> ProfileEntity {
        ProfileEntity::new(id.into(), id.into(), UNIX_EPOCH)
    }

    #[test]
    fn invite_checks_fail_in_order() {
        let now = UNIX_EPOCH + Duration::from_secs(60);
        let mut used_and_expired = invite("ana");
        used_and_expired.used = true;

        assert_eq!(
            check_invite(&used_and_expired, "ben", UNIX_EPOCH + Duration::from_secs(3_600)),
            Err(PairingError::CodeExpired)
        );
        assert_eq!(
            check_invite(&used_and_expired, "ben", now),
            Err(PairingError::CodeAlreadyUsed)
        );
        assert_eq!(
            check_invite(&invite("ben"), "ben", now),
            Err(PairingError::SelfInvite)
        );
        assert_eq!(check_invite(&invite("ana"), "ben", now), Ok(()));
    }

    #[test]
    fn paired_profiles_are_rejected_on_both_sides() {
        let mut taken = profile("ana");
        taken.couple_id = Some(Uuid::new_v4());

        assert_eq!(
            check_requester(Some(&taken)),
            Err(PairingError::AlreadyPaired(PairedParty::Requester))
        );
        assert_eq!(check_requester(None), Ok(()));
        assert_eq!(
            check_inviter(Some(taken)),
            Err(PairingError::AlreadyPaired(PairedParty::Inviter))
        );
        assert_eq!(check_inviter(None), Err(PairingError::InviterMissing));
    }

    #[test]
    fn pairing_links_both_profiles_to_one_couple() {
        let now = UNIX_EPOCH + Duration::from_secs(60);

        let pairing = pair(
            invite("ana"),
            profile("ana"),
            profile("ben"),
            date!(2024 - 02 - 14),
            date!(2024 - 06 - 01),
            Allotment::default(),
            now,
        );

        assert_eq!(pairing.couple.members, ["ana".to_string(), "ben".to_string()]);
        assert_eq!(pairing.inviter.couple_id, Some(pairing.couple.id));
        assert_eq!(pairing.invitee.couple_id, Some(pairing.couple.id));
        assert_eq!(pairing.invitee.paired_at, Some(now));
        assert!(pairing.invite.used);
        assert_eq!(pairing.invite.used_by.as_deref(), Some("ben"));
        assert_eq!(pairing.couple.tickets_remaining, 3);
        assert_eq!(pairing.couple.streak, 0);
        assert_eq!(pairing.couple.last_reset_date, date!(2024 - 06 - 01));
    }
}
