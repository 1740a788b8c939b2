mod policy;

use chrono::{Duration, Utc};
use log::{info, warn};
use thiserror::Error;

pub use policy::*;

use crate::{
    db::{
        BandData, BandMemberData, Database, DatabaseError, InvitationData, InvitationStatus,
        MemberRole, NewBand, NewBandMember, NewInvitation, PrimaryKey, UpdatedBand,
    },
    events::BandEvent,
    CoreContext,
};

pub struct BandManager<Db> {
    context: CoreContext<Db>,
}

#[derive(Debug, Error)]
pub enum BandError {
    /// The band doesn't exist, or the user can't see it.
    /// Non-members get this rather than a permission error,
    /// so the band's existence is not leaked.
    #[error("Band not found")]
    BandNotFound,
    #[error("Not permitted to perform this action")]
    NotPermitted,
    #[error("User is already a member of this band")]
    AlreadyMember,
    #[error("Invitation is invalid or expired")]
    InvalidInvitation,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// Outcome of a role update
#[derive(Debug, PartialEq, Eq)]
pub enum RoleUpdate {
    Updated,
    /// The user is not a member of the band, so nothing was changed
    NotAMember,
}

impl<Db> BandManager<Db>
where
    Db: Database,
{
    const INVITATION_DURATION_IN_DAYS: usize = 7;

    pub fn new(context: &CoreContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a new band with the creator as its first leader
    pub async fn create_band(&self, new_band: NewBand) -> Result<BandData, BandError> {
        let band = self.context.database.create_band(new_band).await?;

        info!("Band {} created", band.name);
        Ok(band)
    }

    /// Returns a band, if the user is a member of it
    pub async fn band(
        &self,
        user_id: PrimaryKey,
        band_id: PrimaryKey,
    ) -> Result<BandData, BandError> {
        self.require_member(band_id, user_id).await?;
        Ok(self.context.database.band_by_id(band_id).await?)
    }

    /// All bands the user belongs to, in the order they were joined
    pub async fn bands_for(&self, user_id: PrimaryKey) -> Result<Vec<BandData>, BandError> {
        Ok(self.context.database.bands_for_user(user_id).await?)
    }

    /// Updates a band's name, personalization, or invite policy. Leaders only.
    pub async fn update_band(
        &self,
        actor: PrimaryKey,
        updated_band: UpdatedBand,
    ) -> Result<BandData, BandError> {
        self.require_leader(updated_band.id, actor).await?;
        Ok(self.context.database.update_band(updated_band).await?)
    }

    /// Deletes a band along with everything attached to it. Leaders only.
    pub async fn delete_band(
        &self,
        actor: PrimaryKey,
        band_id: PrimaryKey,
    ) -> Result<(), BandError> {
        self.require_leader(band_id, actor).await?;

        let band = self.context.database.band_by_id(band_id).await?;
        self.context.database.delete_band(band_id).await?;

        info!("Band {} deleted", band.name);
        Ok(())
    }

    /// The members of a band, visible to members only
    pub async fn members(
        &self,
        user_id: PrimaryKey,
        band_id: PrimaryKey,
    ) -> Result<Vec<BandMemberData>, BandError> {
        self.require_member(band_id, user_id).await?;
        Ok(self.context.database.list_members(band_id).await?)
    }

    /// The role a user holds in a band, or `None` if they are not a member
    pub async fn role_of(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<Option<MemberRole>, BandError> {
        Ok(self.context.database.member_role(band_id, user_id).await?)
    }

    /// Answers whether the actor may perform an action in a band,
    /// resolving roles from the membership table. Unknown bands and
    /// non-members simply answer false.
    pub async fn check_permission(
        &self,
        kind: PermissionKind,
        actor: PrimaryKey,
        band_id: PrimaryKey,
        target: Option<PrimaryKey>,
    ) -> Result<bool, BandError> {
        let actor_role = self.context.database.member_role(band_id, actor).await?;

        let allowed = match kind {
            PermissionKind::ManageBand => can_manage_band(actor_role),
            PermissionKind::ApproveSong => can_approve_song(actor_role),
            PermissionKind::Invite => {
                let band = match self.context.database.band_by_id(band_id).await {
                    Err(DatabaseError::NotFound { .. }) => return Ok(false),
                    result => result?,
                };

                can_invite(actor_role, band.allow_member_invites)
            }
            PermissionKind::RemoveMember => {
                let Some(target) = target else {
                    return Ok(false);
                };

                let target_role = self.context.database.member_role(band_id, target).await?;

                target_role.is_some()
                    && can_remove_member(actor, actor_role, target, target_role)
            }
        };

        Ok(allowed)
    }

    /// Adds a user to a band. Returns false without any side effect
    /// if they are already a member.
    pub async fn add_member(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
        role: MemberRole,
    ) -> Result<bool, BandError> {
        Ok(self.insert_member(band_id, user_id, role).await?.is_some())
    }

    /// Removes a user from a band. Idempotent, returns whether a
    /// membership was actually removed.
    pub async fn remove_member(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<bool, BandError> {
        let role = self.context.database.member_role(band_id, user_id).await?;

        if role.is_none() {
            return Ok(false);
        }

        self.context
            .database
            .delete_band_member(band_id, user_id)
            .await?;

        self.context.emit(BandEvent::MemberLeft { band_id, user_id });
        Ok(true)
    }

    /// Removes a member on behalf of another member. Only leaders can do
    /// this, and neither themselves nor other leaders can be the target.
    pub async fn kick_member(
        &self,
        actor: PrimaryKey,
        band_id: PrimaryKey,
        target: PrimaryKey,
    ) -> Result<bool, BandError> {
        let actor_role = self.require_member(band_id, actor).await?;
        let target_role = self.context.database.member_role(band_id, target).await?;

        if !can_remove_member(actor, Some(actor_role), target, target_role) {
            return Err(BandError::NotPermitted);
        }

        self.remove_member(band_id, target).await
    }

    /// Overwrites a member's role. Does nothing when the user
    /// is not a member, which the outcome makes explicit.
    pub async fn update_role(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
        role: MemberRole,
    ) -> Result<RoleUpdate, BandError> {
        let current = self.context.database.member_role(band_id, user_id).await?;

        let Some(current) = current else {
            return Ok(RoleUpdate::NotAMember);
        };

        self.context
            .database
            .update_member_role(band_id, user_id, role)
            .await?;

        if current.is_leader() && !role.is_leader() {
            let leaders_left = self
                .context
                .database
                .list_members(band_id)
                .await?
                .iter()
                .filter(|m| m.role.is_leader())
                .count();

            if leaders_left == 0 {
                warn!("Band {} no longer has a leader", band_id);
            }
        }

        self.context.emit(BandEvent::MemberRoleUpdated {
            band_id,
            user_id,
            role,
        });

        Ok(RoleUpdate::Updated)
    }

    /// Changes a member's role on behalf of another member. Leaders only.
    pub async fn set_member_role(
        &self,
        actor: PrimaryKey,
        band_id: PrimaryKey,
        target: PrimaryKey,
        role: MemberRole,
    ) -> Result<RoleUpdate, BandError> {
        self.require_leader(band_id, actor).await?;
        self.update_role(band_id, target, role).await
    }

    /// Invites someone to the band by email, returning the invitation with
    /// its code. Leaders can always invite, members only when the band
    /// allows it.
    pub async fn invite(
        &self,
        actor: PrimaryKey,
        band_id: PrimaryKey,
        email: String,
    ) -> Result<InvitationData, BandError> {
        let role = self.require_member(band_id, actor).await?;
        let band = self.context.database.band_by_id(band_id).await?;

        if !can_invite(Some(role), band.allow_member_invites) {
            return Err(BandError::NotPermitted);
        }

        let expires_at = Utc::now() + Duration::days(Self::INVITATION_DURATION_IN_DAYS as i64);

        let invitation = loop {
            let new_invitation = NewInvitation {
                code: crate::util::invitation_code(),
                band_id,
                invited_by: actor,
                invited_email: email.clone(),
                expires_at,
            };

            match self.context.database.create_invitation(new_invitation).await {
                // Regenerate the code and try again if it collided
                Err(DatabaseError::Conflict { field: "code", .. }) => continue,
                result => break result?,
            }
        };

        info!(
            "Invitation {} to band {} sent to {}",
            invitation.code, band.name, invitation.invited_email
        );

        Ok(invitation)
    }

    /// The invitations of a band. Leaders only.
    pub async fn invitations(
        &self,
        actor: PrimaryKey,
        band_id: PrimaryKey,
    ) -> Result<Vec<InvitationData>, BandError> {
        self.require_leader(band_id, actor).await?;
        Ok(self.context.database.list_invitations(band_id).await?)
    }

    /// Looks up an invitation by its code, along with the band it is for.
    /// This backs the page an invited person sees before accepting,
    /// so it requires no membership.
    pub async fn invitation_preview(
        &self,
        code: &str,
    ) -> Result<(InvitationData, BandData), BandError> {
        let invitation = self.fresh_invitation(code).await?;
        let band = self.context.database.band_by_id(invitation.band_id).await?;

        Ok((invitation, band))
    }

    /// Accepts an invitation, making the user a member of the band
    pub async fn accept_invitation(
        &self,
        user_id: PrimaryKey,
        code: &str,
    ) -> Result<BandMemberData, BandError> {
        let invitation = self.fresh_invitation(code).await?;

        if !invitation.is_valid(Utc::now()) {
            return Err(BandError::InvalidInvitation);
        }

        let member = self
            .insert_member(invitation.band_id, user_id, MemberRole::Member)
            .await?
            .ok_or(BandError::AlreadyMember)?;

        self.context
            .database
            .update_invitation_status(invitation.id, InvitationStatus::Accepted)
            .await?;

        let invitation = self.context.database.invitation_by_id(invitation.id).await?;

        info!(
            "{} accepted invitation {} to band {}",
            member.user.display_name, invitation.code, invitation.band_id
        );

        self.context.emit(BandEvent::InvitationAccepted {
            band_id: invitation.band_id,
            invitation,
        });

        Ok(member)
    }

    /// Gives a pending invitation a fresh expiry date.
    /// Requires the same permission as sending one.
    pub async fn resend_invitation(
        &self,
        actor: PrimaryKey,
        band_id: PrimaryKey,
        invitation_id: PrimaryKey,
    ) -> Result<InvitationData, BandError> {
        let role = self.require_member(band_id, actor).await?;
        let band = self.context.database.band_by_id(band_id).await?;

        if !can_invite(Some(role), band.allow_member_invites) {
            return Err(BandError::NotPermitted);
        }

        let invitation = self.context.database.invitation_by_id(invitation_id).await?;

        if invitation.band_id != band_id || invitation.status == InvitationStatus::Accepted {
            return Err(BandError::InvalidInvitation);
        }

        // An invitation that expired by time or status becomes pending again
        if invitation.status == InvitationStatus::Expired {
            self.context
                .database
                .update_invitation_status(invitation.id, InvitationStatus::Pending)
                .await?;
        }

        let expires_at = Utc::now() + Duration::days(Self::INVITATION_DURATION_IN_DAYS as i64);

        Ok(self
            .context
            .database
            .update_invitation_expiry(invitation.id, expires_at)
            .await?)
    }

    /// Inserts a membership row, returning `None` when one already exists
    async fn insert_member(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
        role: MemberRole,
    ) -> Result<Option<BandMemberData>, BandError> {
        let existing = self.context.database.member_role(band_id, user_id).await?;

        if existing.is_some() {
            return Ok(None);
        }

        let new_member = NewBandMember {
            user_id,
            band_id,
            role,
        };

        let member = match self.context.database.create_band_member(new_member).await {
            // Lost a check-then-insert race, treat it as the duplicate it is
            Err(DatabaseError::Conflict { .. }) => return Ok(None),
            result => result?,
        };

        info!(
            "{} joined band {} as {}",
            member.user.display_name,
            band_id,
            member.role.as_str()
        );

        self.context.emit(BandEvent::MemberJoined {
            band_id,
            new_member: member.clone(),
        });

        Ok(Some(member))
    }

    /// Looks up an invitation, marking it expired if its time has passed
    async fn fresh_invitation(&self, code: &str) -> Result<InvitationData, BandError> {
        let mut invitation = self
            .context
            .database
            .invitation_by_code(code)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => BandError::InvalidInvitation,
                e => BandError::Db(e),
            })?;

        if invitation.status == InvitationStatus::Pending && invitation.is_expired(Utc::now()) {
            self.context
                .database
                .update_invitation_status(invitation.id, InvitationStatus::Expired)
                .await?;

            invitation.status = InvitationStatus::Expired;
        }

        Ok(invitation)
    }

    async fn require_member(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<MemberRole, BandError> {
        self.context
            .database
            .member_role(band_id, user_id)
            .await?
            .ok_or(BandError::BandNotFound)
    }

    async fn require_leader(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<(), BandError> {
        let role = self.require_member(band_id, user_id).await?;

        if !role.is_leader() {
            return Err(BandError::NotPermitted);
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::NewUser;
    use crate::test::TestCore;

    #[tokio::test]
    async fn adding_a_member_twice_changes_nothing() {
        let core = TestCore::new().await;
        let (_, band) = core.band("The Offcuts").await;
        let user = core.user("bassist@example.com").await;

        let added = core
            .bands
            .add_member(band.id, user.id, MemberRole::Member)
            .await
            .unwrap();
        assert!(added);

        let role = core.bands.role_of(band.id, user.id).await.unwrap();
        assert_eq!(role, Some(MemberRole::Member));

        let added_again = core
            .bands
            .add_member(band.id, user.id, MemberRole::Leader)
            .await
            .unwrap();
        assert!(!added_again);

        // The failed second insert must not have touched the role
        let role = core.bands.role_of(band.id, user.id).await.unwrap();
        assert_eq!(role, Some(MemberRole::Member));
    }

    #[tokio::test]
    async fn removal_is_idempotent() {
        let core = TestCore::new().await;
        let (_, band) = core.band("The Offcuts").await;
        let user = core.member(band.id, "bassist@example.com").await;

        assert!(core.bands.remove_member(band.id, user.id).await.unwrap());
        assert!(!core.bands.remove_member(band.id, user.id).await.unwrap());
    }

    #[tokio::test]
    async fn role_updates_apply_immediately_and_stay_scoped() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let (_, other_band) = core.band("Side Project").await;
        let user = core.member(band.id, "bassist@example.com").await;

        core.bands
            .add_member(other_band.id, user.id, MemberRole::Member)
            .await
            .unwrap();

        let outcome = core
            .bands
            .set_member_role(leader.id, band.id, user.id, MemberRole::Leader)
            .await
            .unwrap();
        assert_eq!(outcome, RoleUpdate::Updated);

        let role = core.bands.role_of(band.id, user.id).await.unwrap();
        assert_eq!(role, Some(MemberRole::Leader));

        // The same user's role in another band is untouched
        let other_role = core.bands.role_of(other_band.id, user.id).await.unwrap();
        assert_eq!(other_role, Some(MemberRole::Member));
    }

    #[tokio::test]
    async fn updating_an_outsiders_role_is_explicit() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let outsider = core.user("outsider@example.com").await;

        let outcome = core
            .bands
            .set_member_role(leader.id, band.id, outsider.id, MemberRole::Leader)
            .await
            .unwrap();

        assert_eq!(outcome, RoleUpdate::NotAMember);
        assert_eq!(core.bands.role_of(band.id, outsider.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn kicking_respects_the_removal_policy() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let member = core.member(band.id, "bassist@example.com").await;
        let other_leader = core.member(band.id, "keys@example.com").await;

        core.bands
            .update_role(band.id, other_leader.id, MemberRole::Leader)
            .await
            .unwrap();

        // A plain member cannot kick anyone
        let result = core.bands.kick_member(member.id, band.id, leader.id).await;
        assert!(matches!(result, Err(BandError::NotPermitted)));

        // Leaders cannot kick themselves or each other
        let result = core.bands.kick_member(leader.id, band.id, leader.id).await;
        assert!(matches!(result, Err(BandError::NotPermitted)));
        let result = core.bands.kick_member(leader.id, band.id, other_leader.id).await;
        assert!(matches!(result, Err(BandError::NotPermitted)));

        // Kicking a plain member works
        assert!(core.bands.kick_member(leader.id, band.id, member.id).await.unwrap());
        assert_eq!(core.bands.role_of(band.id, member.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn permission_checks_resolve_roles_from_the_database() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let member = core.member(band.id, "bassist@example.com").await;
        let outsider = core.user("outsider@example.com").await;

        let check = |kind, actor: i32, target: Option<i32>| {
            core.bands.check_permission(kind, actor, band.id, target)
        };

        assert!(check(PermissionKind::ManageBand, leader.id, None).await.unwrap());
        assert!(!check(PermissionKind::ManageBand, member.id, None).await.unwrap());
        assert!(!check(PermissionKind::ManageBand, outsider.id, None).await.unwrap());

        // Member invites follow the band's opt-in flag
        assert!(!check(PermissionKind::Invite, member.id, None).await.unwrap());
        core.bands
            .update_band(
                leader.id,
                UpdatedBand {
                    id: band.id,
                    name: None,
                    emoji: None,
                    color: None,
                    monogram: None,
                    allow_member_invites: Some(true),
                },
            )
            .await
            .unwrap();
        assert!(check(PermissionKind::Invite, member.id, None).await.unwrap());

        assert!(check(PermissionKind::RemoveMember, leader.id, Some(member.id)).await.unwrap());
        assert!(!check(PermissionKind::RemoveMember, leader.id, Some(leader.id)).await.unwrap());
        assert!(!check(PermissionKind::RemoveMember, leader.id, None).await.unwrap());
        assert!(!check(PermissionKind::RemoveMember, leader.id, Some(outsider.id)).await.unwrap());

        // An unknown band answers false rather than erroring
        let unknown = core
            .bands
            .check_permission(PermissionKind::Invite, leader.id, 999, None)
            .await
            .unwrap();
        assert!(!unknown);
    }

    #[tokio::test]
    async fn outsiders_cannot_see_a_band() {
        let core = TestCore::new().await;
        let (_, band) = core.band("The Offcuts").await;
        let outsider = core.user("outsider@example.com").await;

        let result = core.bands.band(outsider.id, band.id).await;
        assert!(matches!(result, Err(BandError::BandNotFound)));

        let result = core.bands.members(outsider.id, band.id).await;
        assert!(matches!(result, Err(BandError::BandNotFound)));
    }

    #[tokio::test]
    async fn only_leaders_update_the_band() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let member = core.member(band.id, "bassist@example.com").await;

        let update = UpdatedBand {
            id: band.id,
            name: Some("The Offcuts II".to_string()),
            emoji: None,
            color: None,
            monogram: None,
            allow_member_invites: None,
        };

        let result = core.bands.update_band(member.id, update).await;
        assert!(matches!(result, Err(BandError::NotPermitted)));

        let update = UpdatedBand {
            id: band.id,
            name: Some("The Offcuts II".to_string()),
            emoji: Some("🎸".to_string()),
            color: None,
            monogram: None,
            allow_member_invites: Some(true),
        };

        let band = core.bands.update_band(leader.id, update).await.unwrap();
        assert_eq!(band.name, "The Offcuts II");
        assert_eq!(band.emoji.as_deref(), Some("🎸"));
        assert!(band.allow_member_invites);
    }

    #[tokio::test]
    async fn invitations_can_be_accepted_once() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let invited = core.user("drummer@example.com").await;

        let invitation = core
            .bands
            .invite(leader.id, band.id, "drummer@example.com".to_string())
            .await
            .unwrap();

        assert_eq!(invitation.code.len(), 8);
        assert_eq!(invitation.status, InvitationStatus::Pending);

        let (preview, preview_band) = core
            .bands
            .invitation_preview(&invitation.code)
            .await
            .unwrap();
        assert_eq!(preview.id, invitation.id);
        assert_eq!(preview_band.id, band.id);

        let member = core
            .bands
            .accept_invitation(invited.id, &invitation.code)
            .await
            .unwrap();
        assert_eq!(member.user.id, invited.id);
        assert_eq!(member.role, MemberRole::Member);

        // Accepted invitations cannot be used again
        let result = core.bands.accept_invitation(invited.id, &invitation.code).await;
        assert!(matches!(result, Err(BandError::InvalidInvitation)));
    }

    #[tokio::test]
    async fn member_invites_follow_the_band_setting() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let member = core.member(band.id, "bassist@example.com").await;

        let result = core
            .bands
            .invite(member.id, band.id, "friend@example.com".to_string())
            .await;
        assert!(matches!(result, Err(BandError::NotPermitted)));

        let update = UpdatedBand {
            id: band.id,
            name: None,
            emoji: None,
            color: None,
            monogram: None,
            allow_member_invites: Some(true),
        };
        core.bands.update_band(leader.id, update).await.unwrap();

        core.bands
            .invite(member.id, band.id, "friend@example.com".to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn expired_invitations_are_refused_and_marked() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let invited = core.user("drummer@example.com").await;

        let invitation = core
            .bands
            .invite(leader.id, band.id, "drummer@example.com".to_string())
            .await
            .unwrap();

        // Push the expiry into the past
        core.database
            .update_invitation_expiry(invitation.id, Utc::now() - Duration::days(1))
            .await
            .unwrap();

        let result = core.bands.accept_invitation(invited.id, &invitation.code).await;
        assert!(matches!(result, Err(BandError::InvalidInvitation)));

        let (preview, _) = core.bands.invitation_preview(&invitation.code).await.unwrap();
        assert_eq!(preview.status, InvitationStatus::Expired);

        // Resending revives it with a fresh expiry
        let resent = core
            .bands
            .resend_invitation(leader.id, band.id, invitation.id)
            .await
            .unwrap();
        assert_eq!(resent.status, InvitationStatus::Pending);
        assert!(resent.expires_at > Utc::now());

        core.bands
            .accept_invitation(invited.id, &invitation.code)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn accepting_while_already_a_member_fails() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let member = core.member(band.id, "bassist@example.com").await;

        let invitation = core
            .bands
            .invite(leader.id, band.id, "bassist@example.com".to_string())
            .await
            .unwrap();

        let result = core.bands.accept_invitation(member.id, &invitation.code).await;
        assert!(matches!(result, Err(BandError::AlreadyMember)));
    }

    #[tokio::test]
    async fn demoting_the_last_leader_is_allowed() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;

        let outcome = core
            .bands
            .update_role(band.id, leader.id, MemberRole::Member)
            .await
            .unwrap();

        assert_eq!(outcome, RoleUpdate::Updated);
        assert_eq!(
            core.bands.role_of(band.id, leader.id).await.unwrap(),
            Some(MemberRole::Member)
        );
    }

    #[tokio::test]
    async fn events_follow_membership_changes() {
        let core = TestCore::new().await;
        let (_, band) = core.band("The Offcuts").await;
        let user = core.user("bassist@example.com").await;

        core.drain_events();
        core.bands
            .add_member(band.id, user.id, MemberRole::Member)
            .await
            .unwrap();

        let event = core.next_event();
        assert!(matches!(event, BandEvent::MemberJoined { band_id, .. } if band_id == band.id));

        core.bands.remove_member(band.id, user.id).await.unwrap();

        let event = core.next_event();
        assert!(
            matches!(event, BandEvent::MemberLeft { band_id, user_id } if band_id == band.id && user_id == user.id)
        );
    }

    impl TestCore {
        /// Creates a user directly in the database
        pub async fn user(&self, email: &str) -> crate::db::UserData {
            self.database
                .create_user(NewUser {
                    email: email.to_string(),
                    password: "hash".to_string(),
                    display_name: email.split('@').next().unwrap_or(email).to_string(),
                })
                .await
                .unwrap()
        }

        /// Creates a band with a fresh leader, returning both
        pub async fn band(&self, name: &str) -> (crate::db::UserData, BandData) {
            let email = format!("{}@example.com", name.to_lowercase().replace(' ', "-"));
            let leader = self.user(&email).await;

            let band = self
                .bands
                .create_band(NewBand {
                    name: name.to_string(),
                    emoji: None,
                    color: None,
                    monogram: None,
                    user_id: leader.id,
                })
                .await
                .unwrap();

            (leader, band)
        }

        /// Creates a user and adds them to the band as a plain member
        pub async fn member(&self, band_id: PrimaryKey, email: &str) -> crate::db::UserData {
            let user = self.user(email).await;

            self.bands
                .add_member(band_id, user.id, MemberRole::Member)
                .await
                .unwrap();

            user
        }
    }
}
