//! Pure permission predicates over membership roles.
//!
//! These take the already-loaded role of a user, so callers decide how the
//! role is fetched and the policy itself stays free of side effects.

use serde::{Deserialize, Serialize};

use crate::db::{MemberRole, PrimaryKey};

/// The actions a caller can ask [BandManager::check_permission] about
///
/// [BandManager::check_permission]: super::BandManager::check_permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    ManageBand,
    Invite,
    ApproveSong,
    RemoveMember,
}

pub fn is_member(role: Option<MemberRole>) -> bool {
    role.is_some()
}

pub fn is_leader(role: Option<MemberRole>) -> bool {
    matches!(role, Some(MemberRole::Leader))
}

/// Whether a user can change band settings, approve config updates,
/// or delete the band
pub fn can_manage_band(role: Option<MemberRole>) -> bool {
    is_leader(role)
}

/// Whether a user can send invitations. Leaders always can, plain members
/// only when the band opted into member invites.
pub fn can_invite(role: Option<MemberRole>, allow_member_invites: bool) -> bool {
    is_leader(role) || (is_member(role) && allow_member_invites)
}

/// Whether a user can approve a wishlist song into the repertoire
pub fn can_approve_song(role: Option<MemberRole>) -> bool {
    is_leader(role)
}

/// Whether an actor can remove a target member from the band.
/// Leaders cannot remove themselves, and cannot remove other leaders,
/// so a band never loses its leadership through this path.
pub fn can_remove_member(
    actor: PrimaryKey,
    actor_role: Option<MemberRole>,
    target: PrimaryKey,
    target_role: Option<MemberRole>,
) -> bool {
    is_leader(actor_role) && actor != target && !is_leader(target_role)
}

#[cfg(test)]
mod test {
    use super::*;

    const ROLES: [Option<MemberRole>; 3] =
        [None, Some(MemberRole::Member), Some(MemberRole::Leader)];

    #[test]
    fn only_leaders_manage_and_approve() {
        assert!(can_manage_band(Some(MemberRole::Leader)));
        assert!(!can_manage_band(Some(MemberRole::Member)));
        assert!(!can_manage_band(None));

        assert!(can_approve_song(Some(MemberRole::Leader)));
        assert!(!can_approve_song(Some(MemberRole::Member)));
        assert!(!can_approve_song(None));
    }

    #[test]
    fn member_invites_are_opt_in() {
        assert!(can_invite(Some(MemberRole::Leader), false));
        assert!(can_invite(Some(MemberRole::Leader), true));

        assert!(!can_invite(Some(MemberRole::Member), false));
        assert!(can_invite(Some(MemberRole::Member), true));

        // Non-members never invite, whatever the band allows
        assert!(!can_invite(None, true));
        assert!(!can_invite(None, false));
    }

    #[test]
    fn removal_never_targets_self_or_leaders() {
        for actor_role in ROLES {
            for target_role in ROLES {
                // Self-removal is always refused
                assert!(!can_remove_member(1, actor_role, 1, target_role));

                let allowed = can_remove_member(1, actor_role, 2, target_role);
                let expected = is_leader(actor_role) && !is_leader(target_role);

                assert_eq!(allowed, expected);
            }
        }
    }
}
