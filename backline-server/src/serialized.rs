//! All schemas that are exposed from endpoints are defined here
//! along with the conversion impls

use backline_core::{
    BandData, BandMemberData, BreakInfo as CoreBreakInfo, InvitationData, ProgressData,
    SessionData, Setlist as CoreSetlist, SetlistConfigData, SetlistItem as CoreSetlistItem,
    SetlistSummary as CoreSetlistSummary, SongData, UserData, VoteSummary as CoreVoteSummary,
    WishlistEntry,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct User {
    id: i32,
    email: String,
    display_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Band {
    id: i32,
    name: String,
    emoji: Option<String>,
    color: Option<String>,
    monogram: Option<String>,
    allow_member_invites: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BandMember {
    role: String,
    user: User,
    joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Song {
    id: i32,
    band_id: i32,
    title: String,
    artist: String,
    status: String,
    duration_seconds: Option<i32>,
    last_rehearsed_on: Option<NaiveDate>,
    external_track_id: Option<String>,
    album_art_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistSong {
    song: Song,
    votes: i64,
    voted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Progress {
    user_id: i32,
    song_id: i32,
    status: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteSummary {
    count: i64,
    voted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Invitation {
    id: i32,
    code: String,
    band_id: i32,
    invited_by: i32,
    invited_email: String,
    status: String,
    expires_at: DateTime<Utc>,
}

/// What someone holding an invitation code sees before accepting
#[derive(Debug, Serialize, ToSchema)]
pub struct InvitationPreview {
    invitation: Invitation,
    band: Band,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetlistConfig {
    band_id: i32,
    new_songs_buffer_percent: f64,
    learned_songs_buffer_percent: f64,
    break_time_minutes: i32,
    break_threshold_minutes: i32,
    min_session_minutes: i32,
    max_session_minutes: i32,
    time_cluster_minutes: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetlistItem {
    song_id: i32,
    title: String,
    artist: String,
    block: String,
    buffered_minutes: f64,
    readiness_score: Option<f64>,
    last_rehearsed_on: Option<NaiveDate>,
    cumulative_minutes: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Break {
    minutes: i32,
    position: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetlistSummary {
    requested_minutes: i32,
    clustered_minutes: i32,
    learning_minutes_allocated: i32,
    maintenance_minutes_allocated: i32,
    learning_minutes_used: f64,
    maintenance_minutes_used: f64,
    learning_ratio: f64,
    config: SetlistConfig,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Setlist {
    items: Vec<SetlistItem>,
    break_info: Option<Break>,
    summary: SetlistSummary,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Band> for BandData {
    fn to_serialized(&self) -> Band {
        Band {
            id: self.id,
            name: self.name.clone(),
            emoji: self.emoji.clone(),
            color: self.color.clone(),
            monogram: self.monogram.clone(),
            allow_member_invites: self.allow_member_invites,
        }
    }
}

impl ToSerialized<BandMember> for BandMemberData {
    fn to_serialized(&self) -> BandMember {
        BandMember {
            role: self.role.as_str().to_string(),
            user: self.user.to_serialized(),
            joined_at: self.joined_at,
        }
    }
}

impl ToSerialized<Song> for SongData {
    fn to_serialized(&self) -> Song {
        Song {
            id: self.id,
            band_id: self.band_id,
            title: self.title.clone(),
            artist: self.artist.clone(),
            status: self.status.as_str().to_string(),
            duration_seconds: self.duration_seconds,
            last_rehearsed_on: self.last_rehearsed_on,
            external_track_id: self.external_track_id.clone(),
            album_art_url: self.album_art_url.clone(),
        }
    }
}

impl ToSerialized<WishlistSong> for WishlistEntry {
    fn to_serialized(&self) -> WishlistSong {
        WishlistSong {
            song: self.song.to_serialized(),
            votes: self.votes,
            voted: self.voted,
        }
    }
}

impl ToSerialized<Progress> for ProgressData {
    fn to_serialized(&self) -> Progress {
        Progress {
            user_id: self.user_id,
            song_id: self.song_id,
            status: self.status.as_str().to_string(),
            updated_at: self.updated_at,
        }
    }
}

impl ToSerialized<VoteSummary> for CoreVoteSummary {
    fn to_serialized(&self) -> VoteSummary {
        VoteSummary {
            count: self.count,
            voted: self.voted,
        }
    }
}

impl ToSerialized<Invitation> for InvitationData {
    fn to_serialized(&self) -> Invitation {
        Invitation {
            id: self.id,
            code: self.code.clone(),
            band_id: self.band_id,
            invited_by: self.invited_by,
            invited_email: self.invited_email.clone(),
            status: self.status.as_str().to_string(),
            expires_at: self.expires_at,
        }
    }
}

impl ToSerialized<InvitationPreview> for (InvitationData, BandData) {
    fn to_serialized(&self) -> InvitationPreview {
        InvitationPreview {
            invitation: self.0.to_serialized(),
            band: self.1.to_serialized(),
        }
    }
}

impl ToSerialized<SetlistConfig> for SetlistConfigData {
    fn to_serialized(&self) -> SetlistConfig {
        SetlistConfig {
            band_id: self.band_id,
            new_songs_buffer_percent: self.new_songs_buffer_percent,
            learned_songs_buffer_percent: self.learned_songs_buffer_percent,
            break_time_minutes: self.break_time_minutes,
            break_threshold_minutes: self.break_threshold_minutes,
            min_session_minutes: self.min_session_minutes,
            max_session_minutes: self.max_session_minutes,
            time_cluster_minutes: self.time_cluster_minutes,
        }
    }
}

impl ToSerialized<SetlistItem> for CoreSetlistItem {
    fn to_serialized(&self) -> SetlistItem {
        SetlistItem {
            song_id: self.song_id,
            title: self.title.clone(),
            artist: self.artist.clone(),
            block: self.block.as_str().to_string(),
            buffered_minutes: self.buffered_minutes,
            readiness_score: self.readiness_score,
            last_rehearsed_on: self.last_rehearsed_on,
            cumulative_minutes: self.cumulative_minutes,
        }
    }
}

impl ToSerialized<Break> for CoreBreakInfo {
    fn to_serialized(&self) -> Break {
        Break {
            minutes: self.minutes,
            position: self.position.clone(),
        }
    }
}

impl ToSerialized<SetlistSummary> for CoreSetlistSummary {
    fn to_serialized(&self) -> SetlistSummary {
        SetlistSummary {
            requested_minutes: self.requested_minutes,
            clustered_minutes: self.clustered_minutes,
            learning_minutes_allocated: self.learning_minutes_allocated,
            maintenance_minutes_allocated: self.maintenance_minutes_allocated,
            learning_minutes_used: self.learning_minutes_used,
            maintenance_minutes_used: self.maintenance_minutes_used,
            learning_ratio: self.learning_ratio,
            config: self.config.to_serialized(),
        }
    }
}

impl ToSerialized<Setlist> for CoreSetlist {
    fn to_serialized(&self) -> Setlist {
        Setlist {
            items: self.items.to_serialized(),
            break_info: self.break_info.as_ref().map(|b| b.to_serialized()),
            summary: self.summary.to_serialized(),
        }
    }
}
