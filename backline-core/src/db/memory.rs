use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;

use super::{
    BandData, BandMemberData, Database, DatabaseError, InvitationData, InvitationStatus,
    MemberRole, NewBand, NewBandMember, NewInvitation, NewProgress, NewSession, NewSong, NewUser,
    NewVote, PrimaryKey, ProgressData, ProgressStatus, Result, SessionData, SongData, SongStatus,
    UpdatedBand, UserData, VoteData,
};
use crate::setlist::{SetlistConfigData, SetlistConfigUpdate};

/// A [Database] that lives entirely in memory. Used by tests,
/// since they should not require a running Postgres server.
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_id: PrimaryKey,
    users: Vec<UserData>,
    sessions: Vec<SessionRow>,
    bands: Vec<BandData>,
    members: Vec<MemberRow>,
    songs: Vec<SongData>,
    progress: Vec<ProgressData>,
    votes: Vec<VoteData>,
    invitations: Vec<InvitationData>,
    configs: Vec<SetlistConfigData>,
}

struct SessionRow {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    band_id: Option<PrimaryKey>,
    expires_at: DateTime<Utc>,
}

struct MemberRow {
    band_id: PrimaryKey,
    user_id: PrimaryKey,
    role: MemberRole,
    joined_at: DateTime<Utc>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl State {
    fn assign_id(&mut self) -> PrimaryKey {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })
    }

    fn session(&self, row: &SessionRow) -> Result<SessionData> {
        Ok(SessionData {
            id: row.id,
            token: row.token.clone(),
            expires_at: row.expires_at,
            band_id: row.band_id,
            user: self.user(row.user_id)?,
        })
    }

    fn song_ids_of_band(&self, band_id: PrimaryKey) -> Vec<PrimaryKey> {
        self.songs
            .iter()
            .filter(|s| s.band_id == band_id)
            .map(|s| s.id)
            .collect()
    }

    fn remove_song_relations(&mut self, song_id: PrimaryKey) {
        self.progress.retain(|p| p.song_id != song_id);
        self.votes.retain(|v| v.song_id != song_id);
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.state.lock().user(user_id)
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "email",
            })
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut state = self.state.lock();

        if state.users.iter().any(|u| u.email == new_user.email) {
            return Err(DatabaseError::Conflict {
                resource: "user",
                field: "email",
                value: new_user.email,
            });
        }

        let user = UserData {
            id: state.assign_id(),
            email: new_user.email,
            password: new_user.password,
            display_name: new_user.display_name,
            created_at: Utc::now(),
        };

        state.users.push(user.clone());
        Ok(user)
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let state = self.state.lock();

        let row = state
            .sessions
            .iter()
            .find(|s| s.token == token)
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })?;

        state.session(row)
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let mut state = self.state.lock();

        let row = SessionRow {
            id: state.assign_id(),
            token: new_session.token,
            user_id: new_session.user_id,
            band_id: None,
            expires_at: new_session.expires_at,
        };

        let session = state.session(&row)?;
        state.sessions.push(row);
        Ok(session)
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        self.state.lock().sessions.retain(|s| s.token != token);
        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.state.lock().sessions.retain(|s| s.expires_at > now);
        Ok(())
    }

    async fn set_session_band(
        &self,
        session_id: PrimaryKey,
        band_id: Option<PrimaryKey>,
    ) -> Result<()> {
        let mut state = self.state.lock();

        let row = state
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "id",
            })?;

        row.band_id = band_id;
        Ok(())
    }

    async fn band_by_id(&self, band_id: PrimaryKey) -> Result<BandData> {
        self.state
            .lock()
            .bands
            .iter()
            .find(|b| b.id == band_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "band",
                identifier: "id",
            })
    }

    async fn bands_for_user(&self, user_id: PrimaryKey) -> Result<Vec<BandData>> {
        let state = self.state.lock();

        let bands = state
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| state.bands.iter().find(|b| b.id == m.band_id))
            .cloned()
            .collect();

        Ok(bands)
    }

    async fn create_band(&self, new_band: NewBand) -> Result<BandData> {
        let mut state = self.state.lock();

        let band = BandData {
            id: state.assign_id(),
            name: new_band.name,
            emoji: new_band.emoji,
            color: new_band.color,
            monogram: new_band.monogram,
            allow_member_invites: false,
            created_at: Utc::now(),
        };

        state.bands.push(band.clone());
        state.members.push(MemberRow {
            band_id: band.id,
            user_id: new_band.user_id,
            role: MemberRole::Leader,
            joined_at: Utc::now(),
        });

        Ok(band)
    }

    async fn update_band(&self, updated_band: UpdatedBand) -> Result<BandData> {
        let mut state = self.state.lock();

        let band = state
            .bands
            .iter_mut()
            .find(|b| b.id == updated_band.id)
            .ok_or(DatabaseError::NotFound {
                resource: "band",
                identifier: "id",
            })?;

        if let Some(name) = updated_band.name {
            band.name = name;
        }
        if let Some(emoji) = updated_band.emoji {
            band.emoji = Some(emoji);
        }
        if let Some(color) = updated_band.color {
            band.color = Some(color);
        }
        if let Some(monogram) = updated_band.monogram {
            band.monogram = Some(monogram);
        }
        if let Some(allowed) = updated_band.allow_member_invites {
            band.allow_member_invites = allowed;
        }

        Ok(band.clone())
    }

    async fn delete_band(&self, band_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();

        for song_id in state.song_ids_of_band(band_id) {
            state.remove_song_relations(song_id);
        }

        state.songs.retain(|s| s.band_id != band_id);
        state.members.retain(|m| m.band_id != band_id);
        state.invitations.retain(|i| i.band_id != band_id);
        state.configs.retain(|c| c.band_id != band_id);
        state.bands.retain(|b| b.id != band_id);

        for session in state.sessions.iter_mut() {
            if session.band_id == Some(band_id) {
                session.band_id = None;
            }
        }

        Ok(())
    }

    async fn member_role(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<Option<MemberRole>> {
        let role = self
            .state
            .lock()
            .members
            .iter()
            .find(|m| m.band_id == band_id && m.user_id == user_id)
            .map(|m| m.role);

        Ok(role)
    }

    async fn list_members(&self, band_id: PrimaryKey) -> Result<Vec<BandMemberData>> {
        let state = self.state.lock();

        state
            .members
            .iter()
            .filter(|m| m.band_id == band_id)
            .map(|m| {
                Ok(BandMemberData {
                    user: state.user(m.user_id)?,
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect()
    }

    async fn create_band_member(&self, new_member: NewBandMember) -> Result<BandMemberData> {
        let mut state = self.state.lock();

        let exists = state
            .members
            .iter()
            .any(|m| m.band_id == new_member.band_id && m.user_id == new_member.user_id);

        if exists {
            return Err(DatabaseError::Conflict {
                resource: "band member",
                field: "user_id",
                value: new_member.user_id.to_string(),
            });
        }

        let row = MemberRow {
            band_id: new_member.band_id,
            user_id: new_member.user_id,
            role: new_member.role,
            joined_at: Utc::now(),
        };

        let member = BandMemberData {
            user: state.user(row.user_id)?,
            role: row.role,
            joined_at: row.joined_at,
        };

        state.members.push(row);
        Ok(member)
    }

    async fn delete_band_member(&self, band_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        self.state
            .lock()
            .members
            .retain(|m| !(m.band_id == band_id && m.user_id == user_id));
        Ok(())
    }

    async fn update_member_role(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
        role: MemberRole,
    ) -> Result<()> {
        let mut state = self.state.lock();

        let member = state
            .members
            .iter_mut()
            .find(|m| m.band_id == band_id && m.user_id == user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "band member",
                identifier: "user_id",
            })?;

        member.role = role;
        Ok(())
    }

    async fn song_by_id(&self, song_id: PrimaryKey) -> Result<SongData> {
        self.state
            .lock()
            .songs
            .iter()
            .find(|s| s.id == song_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            })
    }

    async fn list_songs(&self, band_id: PrimaryKey, status: SongStatus) -> Result<Vec<SongData>> {
        let mut songs: Vec<_> = self
            .state
            .lock()
            .songs
            .iter()
            .filter(|s| s.band_id == band_id && s.status == status)
            .cloned()
            .collect();

        songs.sort_by_key(|s| s.id);
        Ok(songs)
    }

    async fn create_song(&self, new_song: NewSong) -> Result<SongData> {
        let mut state = self.state.lock();

        let song = SongData {
            id: state.assign_id(),
            band_id: new_song.band_id,
            title: new_song.title,
            artist: new_song.artist,
            status: new_song.status,
            duration_seconds: new_song.duration_seconds,
            last_rehearsed_on: None,
            external_track_id: new_song.external_track_id,
            album_art_url: new_song.album_art_url,
            created_at: Utc::now(),
        };

        state.songs.push(song.clone());
        Ok(song)
    }

    async fn update_song_status(
        &self,
        song_id: PrimaryKey,
        status: SongStatus,
    ) -> Result<SongData> {
        let mut state = self.state.lock();

        let song = state
            .songs
            .iter_mut()
            .find(|s| s.id == song_id)
            .ok_or(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            })?;

        song.status = status;
        Ok(song.clone())
    }

    async fn set_last_rehearsed(&self, song_id: PrimaryKey, on: NaiveDate) -> Result<SongData> {
        let mut state = self.state.lock();

        let song = state
            .songs
            .iter_mut()
            .find(|s| s.id == song_id)
            .ok_or(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            })?;

        song.last_rehearsed_on = Some(on);
        Ok(song.clone())
    }

    async fn delete_song(&self, song_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();

        state.remove_song_relations(song_id);
        state.songs.retain(|s| s.id != song_id);
        Ok(())
    }

    async fn progress_entry(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<ProgressData> {
        self.state
            .lock()
            .progress
            .iter()
            .find(|p| p.user_id == user_id && p.song_id == song_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "progress",
                identifier: "user_id",
            })
    }

    async fn progress_for_song(&self, song_id: PrimaryKey) -> Result<Vec<ProgressData>> {
        let progress = self
            .state
            .lock()
            .progress
            .iter()
            .filter(|p| p.song_id == song_id)
            .cloned()
            .collect();

        Ok(progress)
    }

    async fn progress_for_band(&self, band_id: PrimaryKey) -> Result<Vec<ProgressData>> {
        let state = self.state.lock();
        let song_ids = state.song_ids_of_band(band_id);

        let progress = state
            .progress
            .iter()
            .filter(|p| song_ids.contains(&p.song_id))
            .cloned()
            .collect();

        Ok(progress)
    }

    async fn create_progress(&self, new_progress: NewProgress) -> Result<ProgressData> {
        let mut state = self.state.lock();

        let exists = state
            .progress
            .iter()
            .any(|p| p.user_id == new_progress.user_id && p.song_id == new_progress.song_id);

        if exists {
            return Err(DatabaseError::Conflict {
                resource: "progress",
                field: "user_id",
                value: new_progress.user_id.to_string(),
            });
        }

        let progress = ProgressData {
            user_id: new_progress.user_id,
            song_id: new_progress.song_id,
            status: new_progress.status,
            updated_at: Utc::now(),
        };

        state.progress.push(progress.clone());
        Ok(progress)
    }

    async fn update_progress_status(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
        status: ProgressStatus,
    ) -> Result<ProgressData> {
        let mut state = self.state.lock();

        let progress = state
            .progress
            .iter_mut()
            .find(|p| p.user_id == user_id && p.song_id == song_id)
            .ok_or(DatabaseError::NotFound {
                resource: "progress",
                identifier: "user_id",
            })?;

        progress.status = status;
        progress.updated_at = Utc::now();
        Ok(progress.clone())
    }

    async fn vote_entry(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<VoteData> {
        self.state
            .lock()
            .votes
            .iter()
            .find(|v| v.user_id == user_id && v.song_id == song_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "vote",
                identifier: "user_id",
            })
    }

    async fn votes_for_band(&self, band_id: PrimaryKey) -> Result<Vec<VoteData>> {
        let state = self.state.lock();
        let song_ids = state.song_ids_of_band(band_id);

        let votes = state
            .votes
            .iter()
            .filter(|v| song_ids.contains(&v.song_id))
            .cloned()
            .collect();

        Ok(votes)
    }

    async fn create_vote(&self, new_vote: NewVote) -> Result<VoteData> {
        let mut state = self.state.lock();

        let exists = state
            .votes
            .iter()
            .any(|v| v.user_id == new_vote.user_id && v.song_id == new_vote.song_id);

        if exists {
            return Err(DatabaseError::Conflict {
                resource: "vote",
                field: "user_id",
                value: new_vote.user_id.to_string(),
            });
        }

        let vote = VoteData {
            user_id: new_vote.user_id,
            song_id: new_vote.song_id,
            created_at: Utc::now(),
        };

        state.votes.push(vote.clone());
        Ok(vote)
    }

    async fn delete_vote(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> Result<()> {
        self.state
            .lock()
            .votes
            .retain(|v| !(v.user_id == user_id && v.song_id == song_id));
        Ok(())
    }

    async fn count_votes(&self, song_id: PrimaryKey) -> Result<i64> {
        let count = self
            .state
            .lock()
            .votes
            .iter()
            .filter(|v| v.song_id == song_id)
            .count();

        Ok(count as i64)
    }

    async fn invitation_by_id(&self, invitation_id: PrimaryKey) -> Result<InvitationData> {
        self.state
            .lock()
            .invitations
            .iter()
            .find(|i| i.id == invitation_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "invitation",
                identifier: "id",
            })
    }

    async fn invitation_by_code(&self, code: &str) -> Result<InvitationData> {
        self.state
            .lock()
            .invitations
            .iter()
            .find(|i| i.code == code)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "invitation",
                identifier: "code",
            })
    }

    async fn list_invitations(&self, band_id: PrimaryKey) -> Result<Vec<InvitationData>> {
        let invitations = self
            .state
            .lock()
            .invitations
            .iter()
            .filter(|i| i.band_id == band_id)
            .cloned()
            .collect();

        Ok(invitations)
    }

    async fn create_invitation(&self, new_invitation: NewInvitation) -> Result<InvitationData> {
        let mut state = self.state.lock();

        if state.invitations.iter().any(|i| i.code == new_invitation.code) {
            return Err(DatabaseError::Conflict {
                resource: "invitation",
                field: "code",
                value: new_invitation.code,
            });
        }

        let invitation = InvitationData {
            id: state.assign_id(),
            code: new_invitation.code,
            band_id: new_invitation.band_id,
            invited_by: new_invitation.invited_by,
            invited_email: new_invitation.invited_email,
            status: InvitationStatus::Pending,
            expires_at: new_invitation.expires_at,
            created_at: Utc::now(),
        };

        state.invitations.push(invitation.clone());
        Ok(invitation)
    }

    async fn update_invitation_status(
        &self,
        invitation_id: PrimaryKey,
        status: InvitationStatus,
    ) -> Result<()> {
        let mut state = self.state.lock();

        let invitation = state
            .invitations
            .iter_mut()
            .find(|i| i.id == invitation_id)
            .ok_or(DatabaseError::NotFound {
                resource: "invitation",
                identifier: "id",
            })?;

        invitation.status = status;
        Ok(())
    }

    async fn update_invitation_expiry(
        &self,
        invitation_id: PrimaryKey,
        expires_at: DateTime<Utc>,
    ) -> Result<InvitationData> {
        let mut state = self.state.lock();

        let invitation = state
            .invitations
            .iter_mut()
            .find(|i| i.id == invitation_id)
            .ok_or(DatabaseError::NotFound {
                resource: "invitation",
                identifier: "id",
            })?;

        invitation.expires_at = expires_at;
        Ok(invitation.clone())
    }

    async fn setlist_config(&self, band_id: PrimaryKey) -> Result<SetlistConfigData> {
        self.state
            .lock()
            .configs
            .iter()
            .find(|c| c.band_id == band_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "setlist config",
                identifier: "band_id",
            })
    }

    async fn create_setlist_config(&self, config: SetlistConfigData) -> Result<SetlistConfigData> {
        let mut state = self.state.lock();

        if state.configs.iter().any(|c| c.band_id == config.band_id) {
            return Err(DatabaseError::Conflict {
                resource: "setlist config",
                field: "band_id",
                value: config.band_id.to_string(),
            });
        }

        state.configs.push(config.clone());
        Ok(config)
    }

    async fn update_setlist_config(
        &self,
        update: SetlistConfigUpdate,
    ) -> Result<SetlistConfigData> {
        let mut state = self.state.lock();

        let config = state
            .configs
            .iter_mut()
            .find(|c| c.band_id == update.band_id)
            .ok_or(DatabaseError::NotFound {
                resource: "setlist config",
                identifier: "band_id",
            })?;

        *config = update.apply_to(config);
        Ok(config.clone())
    }
}
