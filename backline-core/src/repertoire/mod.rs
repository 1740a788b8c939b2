use chrono::NaiveDate;
use log::info;
use thiserror::Error;

use crate::{
    bands::{can_approve_song, can_manage_band},
    db::{
        Database, DatabaseError, MemberRole, NewProgress, NewSong, NewVote, PrimaryKey,
        ProgressData, ProgressStatus, SongData, SongStatus,
    },
    events::BandEvent,
    CoreContext,
};

pub struct RepertoireManager<Db> {
    context: CoreContext<Db>,
}

#[derive(Debug, Error)]
pub enum RepertoireError {
    /// The song doesn't exist, or belongs to a band the user can't see
    #[error("Song not found")]
    SongNotFound,
    /// The band doesn't exist, or the user can't see it
    #[error("Band not found")]
    BandNotFound,
    #[error("Not permitted to perform this action")]
    NotPermitted,
    /// The operation only applies to wishlist songs
    #[error("Song is not in the wishlist")]
    NotInWishlist,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// A wishlist song along with its vote tally
#[derive(Debug, Clone)]
pub struct WishlistEntry {
    pub song: SongData,
    pub votes: i64,
    /// Whether the requesting user has cast one of those votes
    pub voted: bool,
}

/// The vote tally after a toggle
#[derive(Debug, Clone, Copy)]
pub struct VoteSummary {
    pub count: i64,
    pub voted: bool,
}

impl<Db> RepertoireManager<Db>
where
    Db: Database,
{
    pub fn new(context: &CoreContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Adds a song to a band. Any member can propose to the wishlist,
    /// but adding straight to the active repertoire is a leader action.
    pub async fn create_song(
        &self,
        actor: PrimaryKey,
        new_song: NewSong,
    ) -> Result<SongData, RepertoireError> {
        let role = self
            .context
            .database
            .member_role(new_song.band_id, actor)
            .await?
            .ok_or(RepertoireError::BandNotFound)?;

        if new_song.status == SongStatus::Active && !can_approve_song(Some(role)) {
            return Err(RepertoireError::NotPermitted);
        }

        let song = self.context.database.create_song(new_song).await?;

        info!(
            "Song {} by {} added to band {} as {}",
            song.title,
            song.artist,
            song.band_id,
            song.status.as_str()
        );

        Ok(song)
    }

    /// Returns a song, if the user is a member of its band
    pub async fn song(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<SongData, RepertoireError> {
        let (song, _) = self.accessible_song(user_id, song_id).await?;
        Ok(song)
    }

    /// The songs of a band in one status, in the order they were added
    pub async fn songs(
        &self,
        user_id: PrimaryKey,
        band_id: PrimaryKey,
        status: SongStatus,
    ) -> Result<Vec<SongData>, RepertoireError> {
        self.require_member(band_id, user_id).await?;
        Ok(self.context.database.list_songs(band_id, status).await?)
    }

    /// The band's wishlist with vote tallies for each song
    pub async fn wishlist(
        &self,
        user_id: PrimaryKey,
        band_id: PrimaryKey,
    ) -> Result<Vec<WishlistEntry>, RepertoireError> {
        self.require_member(band_id, user_id).await?;

        let songs = self
            .context
            .database
            .list_songs(band_id, SongStatus::Wishlist)
            .await?;
        let votes = self.context.database.votes_for_band(band_id).await?;

        let entries = songs
            .into_iter()
            .map(|song| {
                let votes_for_song: Vec<_> =
                    votes.iter().filter(|v| v.song_id == song.id).collect();

                WishlistEntry {
                    votes: votes_for_song.len() as i64,
                    voted: votes_for_song.iter().any(|v| v.user_id == user_id),
                    song,
                }
            })
            .collect();

        Ok(entries)
    }

    /// Approves a wishlist song into the active repertoire. Leaders only.
    /// Every member without a progress record on the song starts at the
    /// bottom of the learning scale.
    pub async fn approve_song(
        &self,
        actor: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<SongData, RepertoireError> {
        let (song, role) = self.accessible_song(actor, song_id).await?;

        if !can_approve_song(Some(role)) {
            return Err(RepertoireError::NotPermitted);
        }

        if song.status != SongStatus::Wishlist {
            return Err(RepertoireError::NotInWishlist);
        }

        let song = self
            .context
            .database
            .update_song_status(song.id, SongStatus::Active)
            .await?;

        let members = self.context.database.list_members(song.band_id).await?;
        let existing = self.context.database.progress_for_song(song.id).await?;

        for member in members {
            if existing.iter().any(|p| p.user_id == member.user.id) {
                continue;
            }

            let new_progress = NewProgress {
                user_id: member.user.id,
                song_id: song.id,
                status: ProgressStatus::ToListen,
            };

            match self.context.database.create_progress(new_progress).await {
                // Someone reported progress while we were iterating
                Err(DatabaseError::Conflict { .. }) => continue,
                result => {
                    result?;
                }
            }
        }

        info!(
            "Song {} approved into the repertoire of band {}",
            song.title, song.band_id
        );

        self.context.emit(BandEvent::SongApproved {
            band_id: song.band_id,
            song: song.clone(),
        });

        Ok(song)
    }

    /// Records that the band rehearsed a song on the given date
    pub async fn mark_rehearsed(
        &self,
        actor: PrimaryKey,
        song_id: PrimaryKey,
        on: NaiveDate,
    ) -> Result<SongData, RepertoireError> {
        let (song, _) = self.accessible_song(actor, song_id).await?;

        Ok(self
            .context
            .database
            .set_last_rehearsed(song.id, on)
            .await?)
    }

    /// Upserts the user's own progress on a song
    pub async fn set_progress(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
        status: ProgressStatus,
    ) -> Result<ProgressData, RepertoireError> {
        let _ = self.accessible_song(user_id, song_id).await?;

        let update = self
            .context
            .database
            .update_progress_status(user_id, song_id, status)
            .await;

        let progress = match update {
            Err(DatabaseError::NotFound { .. }) => {
                let new_progress = NewProgress {
                    user_id,
                    song_id,
                    status,
                };

                match self.context.database.create_progress(new_progress).await {
                    // Lost an upsert race, the row exists now
                    Err(DatabaseError::Conflict { .. }) => {
                        self.context
                            .database
                            .update_progress_status(user_id, song_id, status)
                            .await?
                    }
                    result => result?,
                }
            }
            result => result?,
        };

        Ok(progress)
    }

    /// Every member's progress on a song
    pub async fn song_progress(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<Vec<ProgressData>, RepertoireError> {
        let _ = self.accessible_song(user_id, song_id).await?;
        Ok(self.context.database.progress_for_song(song_id).await?)
    }

    /// Casts or retracts the user's vote on a wishlist song,
    /// returning the new tally
    pub async fn toggle_vote(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<VoteSummary, RepertoireError> {
        let (song, _) = self.accessible_song(user_id, song_id).await?;

        if song.status != SongStatus::Wishlist {
            return Err(RepertoireError::NotInWishlist);
        }

        let existing = self.context.database.vote_entry(user_id, song_id).await;

        let voted = match existing {
            Ok(_) => {
                self.context.database.delete_vote(user_id, song_id).await?;
                false
            }
            Err(DatabaseError::NotFound { .. }) => {
                let new_vote = NewVote { user_id, song_id };

                match self.context.database.create_vote(new_vote).await {
                    // A double submit raced us, the vote is cast either way
                    Err(DatabaseError::Conflict { .. }) => {}
                    result => {
                        result?;
                    }
                }

                true
            }
            Err(e) => return Err(e.into()),
        };

        let count = self.context.database.count_votes(song_id).await?;
        Ok(VoteSummary { count, voted })
    }

    /// Removes a song and everything attached to it. Leaders only.
    pub async fn delete_song(
        &self,
        actor: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<(), RepertoireError> {
        let (song, role) = self.accessible_song(actor, song_id).await?;

        if !can_manage_band(Some(role)) {
            return Err(RepertoireError::NotPermitted);
        }

        self.context.database.delete_song(song.id).await?;

        info!("Song {} removed from band {}", song.title, song.band_id);
        Ok(())
    }

    /// Loads a song and proves the user can see it, hiding
    /// songs of other bands behind a not-found
    async fn accessible_song(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> Result<(SongData, MemberRole), RepertoireError> {
        let song = self
            .context
            .database
            .song_by_id(song_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => RepertoireError::SongNotFound,
                e => RepertoireError::Db(e),
            })?;

        let role = self
            .context
            .database
            .member_role(song.band_id, user_id)
            .await?
            .ok_or(RepertoireError::SongNotFound)?;

        Ok((song, role))
    }

    async fn require_member(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<MemberRole, RepertoireError> {
        self.context
            .database
            .member_role(band_id, user_id)
            .await?
            .ok_or(RepertoireError::BandNotFound)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::PrimaryKey;
    use crate::test::TestCore;

    impl TestCore {
        /// Adds a wishlist song to the band, proposed by the given member
        pub async fn wishlist_song(
            &self,
            proposer: PrimaryKey,
            band_id: PrimaryKey,
            title: &str,
        ) -> SongData {
            self.repertoire
                .create_song(
                    proposer,
                    NewSong {
                        band_id,
                        title: title.to_string(),
                        artist: "Unknown".to_string(),
                        status: SongStatus::Wishlist,
                        duration_seconds: Some(240),
                        external_track_id: None,
                        album_art_url: None,
                    },
                )
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn members_propose_but_only_leaders_add_directly() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let member = core.member(band.id, "bassist@example.com").await;

        core.wishlist_song(member.id, band.id, "Creep").await;

        let direct = core
            .repertoire
            .create_song(
                member.id,
                NewSong {
                    band_id: band.id,
                    title: "Karma Police".to_string(),
                    artist: "Radiohead".to_string(),
                    status: SongStatus::Active,
                    duration_seconds: Some(262),
                    external_track_id: None,
                    album_art_url: None,
                },
            )
            .await;

        assert!(matches!(direct, Err(RepertoireError::NotPermitted)));

        core.repertoire
            .create_song(
                leader.id,
                NewSong {
                    band_id: band.id,
                    title: "Karma Police".to_string(),
                    artist: "Radiohead".to_string(),
                    status: SongStatus::Active,
                    duration_seconds: Some(262),
                    external_track_id: None,
                    album_art_url: None,
                },
            )
            .await
            .unwrap();

        let active = core
            .repertoire
            .songs(member.id, band.id, SongStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);

        let wishlist = core
            .repertoire
            .songs(member.id, band.id, SongStatus::Wishlist)
            .await
            .unwrap();
        assert_eq!(wishlist.len(), 1);
    }

    #[tokio::test]
    async fn votes_toggle_and_tally() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let member = core.member(band.id, "bassist@example.com").await;
        let song = core.wishlist_song(member.id, band.id, "Creep").await;

        let tally = core.repertoire.toggle_vote(member.id, song.id).await.unwrap();
        assert!(tally.voted);
        assert_eq!(tally.count, 1);

        let tally = core.repertoire.toggle_vote(leader.id, song.id).await.unwrap();
        assert!(tally.voted);
        assert_eq!(tally.count, 2);

        // Toggling again retracts the vote
        let tally = core.repertoire.toggle_vote(member.id, song.id).await.unwrap();
        assert!(!tally.voted);
        assert_eq!(tally.count, 1);

        let wishlist = core.repertoire.wishlist(member.id, band.id).await.unwrap();
        assert_eq!(wishlist.len(), 1);
        assert_eq!(wishlist[0].votes, 1);
        assert!(!wishlist[0].voted);

        let wishlist = core.repertoire.wishlist(leader.id, band.id).await.unwrap();
        assert!(wishlist[0].voted);
    }

    #[tokio::test]
    async fn only_wishlist_songs_take_votes() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let song = core.wishlist_song(leader.id, band.id, "Creep").await;

        core.repertoire.approve_song(leader.id, song.id).await.unwrap();

        let result = core.repertoire.toggle_vote(leader.id, song.id).await;
        assert!(matches!(result, Err(RepertoireError::NotInWishlist)));
    }

    #[tokio::test]
    async fn approval_is_leader_only_and_fans_out_progress() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let bassist = core.member(band.id, "bassist@example.com").await;
        let drummer = core.member(band.id, "drummer@example.com").await;
        let song = core.wishlist_song(bassist.id, band.id, "Creep").await;

        // The bassist got ahead of the approval
        core.repertoire
            .set_progress(bassist.id, song.id, ProgressStatus::InPractice)
            .await
            .unwrap();

        let result = core.repertoire.approve_song(bassist.id, song.id).await;
        assert!(matches!(result, Err(RepertoireError::NotPermitted)));

        let song = core.repertoire.approve_song(leader.id, song.id).await.unwrap();
        assert_eq!(song.status, SongStatus::Active);

        let progress = core.repertoire.song_progress(leader.id, song.id).await.unwrap();
        assert_eq!(progress.len(), 3);

        let of = |user: PrimaryKey| {
            progress
                .iter()
                .find(|p| p.user_id == user)
                .map(|p| p.status)
        };

        // Existing progress survives, everyone else starts at the bottom
        assert_eq!(of(bassist.id), Some(ProgressStatus::InPractice));
        assert_eq!(of(leader.id), Some(ProgressStatus::ToListen));
        assert_eq!(of(drummer.id), Some(ProgressStatus::ToListen));

        // Approving twice is refused
        let result = core.repertoire.approve_song(leader.id, song.id).await;
        assert!(matches!(result, Err(RepertoireError::NotInWishlist)));
    }

    #[tokio::test]
    async fn progress_upserts_and_refreshes_the_timestamp() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let song = core.wishlist_song(leader.id, band.id, "Creep").await;

        let first = core
            .repertoire
            .set_progress(leader.id, song.id, ProgressStatus::InPractice)
            .await
            .unwrap();
        assert_eq!(first.status, ProgressStatus::InPractice);

        let second = core
            .repertoire
            .set_progress(leader.id, song.id, ProgressStatus::Mastered)
            .await
            .unwrap();
        assert_eq!(second.status, ProgressStatus::Mastered);
        assert!(second.updated_at >= first.updated_at);

        // Still a single record per user and song
        let progress = core.repertoire.song_progress(leader.id, song.id).await.unwrap();
        assert_eq!(progress.len(), 1);
    }

    #[tokio::test]
    async fn rehearsal_dates_are_recorded() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let song = core.wishlist_song(leader.id, band.id, "Creep").await;

        let on = NaiveDate::from_ymd_opt(2024, 11, 2).unwrap();
        let song = core.repertoire.mark_rehearsed(leader.id, song.id, on).await.unwrap();

        assert_eq!(song.last_rehearsed_on, Some(on));
    }

    #[tokio::test]
    async fn songs_of_other_bands_stay_hidden() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let song = core.wishlist_song(leader.id, band.id, "Creep").await;
        let outsider = core.user("outsider@example.com").await;

        let result = core.repertoire.song(outsider.id, song.id).await;
        assert!(matches!(result, Err(RepertoireError::SongNotFound)));

        let result = core.repertoire.toggle_vote(outsider.id, song.id).await;
        assert!(matches!(result, Err(RepertoireError::SongNotFound)));

        let result = core
            .repertoire
            .songs(outsider.id, band.id, SongStatus::Wishlist)
            .await;
        assert!(matches!(result, Err(RepertoireError::BandNotFound)));
    }

    #[tokio::test]
    async fn deleting_a_song_clears_its_votes_and_progress() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let member = core.member(band.id, "bassist@example.com").await;
        let song = core.wishlist_song(member.id, band.id, "Creep").await;

        core.repertoire.toggle_vote(member.id, song.id).await.unwrap();
        core.repertoire
            .set_progress(member.id, song.id, ProgressStatus::InPractice)
            .await
            .unwrap();

        let result = core.repertoire.delete_song(member.id, song.id).await;
        assert!(matches!(result, Err(RepertoireError::NotPermitted)));

        core.repertoire.delete_song(leader.id, song.id).await.unwrap();

        let result = core.repertoire.song(leader.id, song.id).await;
        assert!(matches!(result, Err(RepertoireError::SongNotFound)));
        assert!(core.database.progress_entry(member.id, song.id).await.is_err());
        assert_eq!(core.database.count_votes(song.id).await.unwrap(), 0);
    }
}
