use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// Error returned when a status column holds a value no variant matches.
#[derive(Debug, Error)]
#[error("unrecognized {kind} value {value:?}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

/// A backline account
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: PrimaryKey,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Login session data for authentication.
///
/// `band_id` is the band the session last selected. It is a UI default,
/// never an authorization: every read re-validates it against the
/// membership table and treats a stale value as absent.
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The band currently selected by this session, if any
    pub band_id: Option<PrimaryKey>,
    /// The user that is logged in
    pub user: UserData,
}

/// A band sharing a repertoire
#[derive(Debug, Clone)]
pub struct BandData {
    pub id: PrimaryKey,
    pub name: String,
    /// Optional personalization shown next to the name
    pub emoji: Option<String>,
    pub color: Option<String>,
    /// A single-letter fallback when no emoji is set
    pub monogram: Option<String>,
    /// When true, plain members may send invitations too
    pub allow_member_invites: bool,
    pub created_at: DateTime<Utc>,
}

/// A member of a band.
/// Note: `user` and the band are unique together, there is no row id.
#[derive(Debug, Clone)]
pub struct BandMemberData {
    pub user: UserData,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

/// The role a membership carries within one band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Leader,
    Member,
}

/// A song belonging to a band's repertoire or wishlist
#[derive(Debug, Clone)]
pub struct SongData {
    pub id: PrimaryKey,
    pub band_id: PrimaryKey,
    pub title: String,
    pub artist: String,
    pub status: SongStatus,
    /// Playing length. Songs without one cannot be scheduled.
    pub duration_seconds: Option<i32>,
    pub last_rehearsed_on: Option<NaiveDate>,
    /// Track id on an external catalog, if the song was picked from one
    pub external_track_id: Option<String>,
    pub album_art_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongStatus {
    Wishlist,
    Active,
}

/// One member's learning state on one song.
/// Note: `user_id` and `song_id` are unique together.
#[derive(Debug, Clone)]
pub struct ProgressData {
    pub user_id: PrimaryKey,
    pub song_id: PrimaryKey,
    pub status: ProgressStatus,
    pub updated_at: DateTime<Utc>,
}

/// The ordered learning scale a progress record moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    ToListen,
    InPractice,
    ReadyForRehearsal,
    Mastered,
}

/// A wishlist vote. Existence is the whole signal.
/// Note: `user_id` and `song_id` are unique together.
#[derive(Debug, Clone)]
pub struct VoteData {
    pub user_id: PrimaryKey,
    pub song_id: PrimaryKey,
    pub created_at: DateTime<Utc>,
}

/// An invitation to join a band
#[derive(Debug, Clone)]
pub struct InvitationData {
    pub id: PrimaryKey,
    /// The unique 8-character code identifying the invitation
    pub code: String,
    pub band_id: PrimaryKey,
    pub invited_by: PrimaryKey,
    pub invited_email: String,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leader => "leader",
            Self::Member => "member",
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Leader)
    }
}

impl FromStr for MemberRole {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "leader" => Ok(Self::Leader),
            "member" => Ok(Self::Member),
            other => Err(ParseStatusError {
                kind: "member role",
                value: other.to_string(),
            }),
        }
    }
}

impl SongStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wishlist => "wishlist",
            Self::Active => "active",
        }
    }
}

impl FromStr for SongStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "wishlist" => Ok(Self::Wishlist),
            "active" => Ok(Self::Active),
            other => Err(ParseStatusError {
                kind: "song status",
                value: other.to_string(),
            }),
        }
    }
}

impl ProgressStatus {
    /// Position on the learning scale, used for readiness scoring
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::ToListen => 1,
            Self::InPractice => 2,
            Self::ReadyForRehearsal => 3,
            Self::Mastered => 4,
        }
    }

    /// Whether this state needs no further active learning
    pub fn is_rehearsal_ready(&self) -> bool {
        matches!(self, Self::ReadyForRehearsal | Self::Mastered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToListen => "to_listen",
            Self::InPractice => "in_practice",
            Self::ReadyForRehearsal => "ready_for_rehearsal",
            Self::Mastered => "mastered",
        }
    }
}

impl FromStr for ProgressStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "to_listen" => Ok(Self::ToListen),
            "in_practice" => Ok(Self::InPractice),
            "ready_for_rehearsal" => Ok(Self::ReadyForRehearsal),
            "mastered" => Ok(Self::Mastered),
            other => Err(ParseStatusError {
                kind: "progress status",
                value: other.to_string(),
            }),
        }
    }
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for InvitationStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "expired" => Ok(Self::Expired),
            other => Err(ParseStatusError {
                kind: "invitation status",
                value: other.to_string(),
            }),
        }
    }
}

impl InvitationData {
    /// Whether the expiry timestamp has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// A pending invitation that has not expired can still be accepted
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && !self.is_expired(now)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    #[test]
    fn progress_scale_is_ordered() {
        let scale = [
            ProgressStatus::ToListen,
            ProgressStatus::InPractice,
            ProgressStatus::ReadyForRehearsal,
            ProgressStatus::Mastered,
        ];

        let ordinals: Vec<_> = scale.iter().map(|s| s.ordinal()).collect();
        assert_eq!(ordinals, vec![1, 2, 3, 4]);

        assert!(!ProgressStatus::InPractice.is_rehearsal_ready());
        assert!(ProgressStatus::ReadyForRehearsal.is_rehearsal_ready());
        assert!(ProgressStatus::Mastered.is_rehearsal_ready());
    }

    #[test]
    fn statuses_round_trip_through_text() {
        for status in ["to_listen", "in_practice", "ready_for_rehearsal", "mastered"] {
            let parsed: ProgressStatus = status.parse().unwrap();
            assert_eq!(parsed.as_str(), status);
        }

        assert!("somewhat_ready".parse::<ProgressStatus>().is_err());
        assert!("owner".parse::<MemberRole>().is_err());
    }

    #[test]
    fn invitation_validity_follows_status_and_expiry() {
        let now = Utc::now();

        let invitation = InvitationData {
            id: 1,
            code: "AB12CD34".to_string(),
            band_id: 1,
            invited_by: 1,
            invited_email: "bassist@example.com".to_string(),
            status: InvitationStatus::Pending,
            expires_at: now + Duration::days(7),
            created_at: now,
        };

        assert!(invitation.is_valid(now));
        assert!(!invitation.is_expired(now));

        // Past the expiry timestamp the invitation stops being valid
        let later = now + Duration::days(8);
        assert!(invitation.is_expired(later));
        assert!(!invitation.is_valid(later));

        let accepted = InvitationData {
            status: InvitationStatus::Accepted,
            ..invitation
        };
        assert!(!accepted.is_valid(now));
    }
}
