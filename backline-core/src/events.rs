use crossbeam::channel::{Receiver, Sender};

use crate::db::{BandMemberData, InvitationData, MemberRole, PrimaryKey, SongData};

pub type EventSender = Sender<BandEvent>;
pub type EventReceiver = Receiver<BandEvent>;

/// Events emitted by the backline system when a band changes
#[derive(Debug)]
pub enum BandEvent {
    /// A user became a member of a band
    MemberJoined {
        band_id: PrimaryKey,
        new_member: BandMemberData,
    },
    /// A user left a band, or was removed from it
    MemberLeft {
        band_id: PrimaryKey,
        user_id: PrimaryKey,
    },
    /// A member's role within a band changed
    MemberRoleUpdated {
        band_id: PrimaryKey,
        user_id: PrimaryKey,
        role: MemberRole,
    },
    /// A wishlist song was approved into the active repertoire
    SongApproved {
        band_id: PrimaryKey,
        song: SongData,
    },
    /// An invitation was accepted by the invited user
    InvitationAccepted {
        band_id: PrimaryKey,
        invitation: InvitationData,
    },
}
