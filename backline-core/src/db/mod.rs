use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::setlist::{SetlistConfigData, SetlistConfigUpdate};

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("duplicate {resource}: {field} {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound {
                    resource: _,
                    identifier: _,
                } => Ok(()),
                e => Err(e),
            },
        }
    }
}

/// Represents a type that can fetch backline data from a database
#[async_trait]
pub trait Database {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_email(&self, email: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;
    /// Stores the band a session last selected. `None` clears the selection.
    async fn set_session_band(
        &self,
        session_id: PrimaryKey,
        band_id: Option<PrimaryKey>,
    ) -> Result<()>;

    async fn band_by_id(&self, band_id: PrimaryKey) -> Result<BandData>;
    /// All bands the user belongs to, in the order they were joined
    async fn bands_for_user(&self, user_id: PrimaryKey) -> Result<Vec<BandData>>;
    async fn create_band(&self, new_band: NewBand) -> Result<BandData>;
    async fn update_band(&self, updated_band: UpdatedBand) -> Result<BandData>;
    async fn delete_band(&self, band_id: PrimaryKey) -> Result<()>;

    /// The role a user holds in a band, or `None` when they are not a member
    async fn member_role(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<Option<MemberRole>>;
    async fn list_members(&self, band_id: PrimaryKey) -> Result<Vec<BandMemberData>>;
    async fn create_band_member(&self, new_member: NewBandMember) -> Result<BandMemberData>;
    async fn delete_band_member(&self, band_id: PrimaryKey, user_id: PrimaryKey) -> Result<()>;
    async fn update_member_role(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
        role: MemberRole,
    ) -> Result<()>;

    async fn song_by_id(&self, song_id: PrimaryKey) -> Result<SongData>;
    /// Songs of a band in one status, in the order they were added
    async fn list_songs(&self, band_id: PrimaryKey, status: SongStatus) -> Result<Vec<SongData>>;
    async fn create_song(&self, new_song: NewSong) -> Result<SongData>;
    async fn update_song_status(&self, song_id: PrimaryKey, status: SongStatus)
        -> Result<SongData>;
    async fn set_last_rehearsed(&self, song_id: PrimaryKey, on: NaiveDate) -> Result<SongData>;
    async fn delete_song(&self, song_id: PrimaryKey) -> Result<()>;

    async fn progress_entry(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<ProgressData>;
    async fn progress_for_song(&self, song_id: PrimaryKey) -> Result<Vec<ProgressData>>;
    /// Every progress record attached to any song of the band
    async fn progress_for_band(&self, band_id: PrimaryKey) -> Result<Vec<ProgressData>>;
    async fn create_progress(&self, new_progress: NewProgress) -> Result<ProgressData>;
    async fn update_progress_status(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
        status: ProgressStatus,
    ) -> Result<ProgressData>;

    async fn vote_entry(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<VoteData>;
    async fn votes_for_band(&self, band_id: PrimaryKey) -> Result<Vec<VoteData>>;
    async fn create_vote(&self, new_vote: NewVote) -> Result<VoteData>;
    async fn delete_vote(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()>;
    async fn count_votes(&self, song_id: PrimaryKey) -> Result<i64>;

    async fn invitation_by_id(&self, invitation_id: PrimaryKey) -> Result<InvitationData>;
    async fn invitation_by_code(&self, code: &str) -> Result<InvitationData>;
    async fn list_invitations(&self, band_id: PrimaryKey) -> Result<Vec<InvitationData>>;
    async fn create_invitation(&self, new_invitation: NewInvitation) -> Result<InvitationData>;
    async fn update_invitation_status(
        &self,
        invitation_id: PrimaryKey,
        status: InvitationStatus,
    ) -> Result<()>;
    async fn update_invitation_expiry(
        &self,
        invitation_id: PrimaryKey,
        expires_at: DateTime<Utc>,
    ) -> Result<InvitationData>;

    async fn setlist_config(&self, band_id: PrimaryKey) -> Result<SetlistConfigData>;
    async fn create_setlist_config(&self, config: SetlistConfigData) -> Result<SetlistConfigData>;
    async fn update_setlist_config(&self, update: SetlistConfigUpdate)
        -> Result<SetlistConfigData>;
}

#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewBand {
    pub name: String,
    pub emoji: Option<String>,
    pub color: Option<String>,
    pub monogram: Option<String>,
    /// The founder of the new band, who becomes its first leader
    pub user_id: PrimaryKey,
}

#[derive(Debug)]
pub struct UpdatedBand {
    pub id: PrimaryKey,
    pub name: Option<String>,
    pub emoji: Option<String>,
    pub color: Option<String>,
    pub monogram: Option<String>,
    pub allow_member_invites: Option<bool>,
}

#[derive(Debug)]
pub struct NewBandMember {
    pub user_id: PrimaryKey,
    pub band_id: PrimaryKey,
    pub role: MemberRole,
}

#[derive(Debug)]
pub struct NewSong {
    pub band_id: PrimaryKey,
    pub title: String,
    pub artist: String,
    pub status: SongStatus,
    pub duration_seconds: Option<i32>,
    pub external_track_id: Option<String>,
    pub album_art_url: Option<String>,
}

#[derive(Debug)]
pub struct NewProgress {
    pub user_id: PrimaryKey,
    pub song_id: PrimaryKey,
    pub status: ProgressStatus,
}

#[derive(Debug)]
pub struct NewVote {
    pub user_id: PrimaryKey,
    pub song_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewInvitation {
    pub code: String,
    pub band_id: PrimaryKey,
    /// The inviter of the new invitation
    pub invited_by: PrimaryKey,
    pub invited_email: String,
    pub expires_at: DateTime<Utc>,
}
