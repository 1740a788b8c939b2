use log::info;
use thiserror::Error;

use crate::{
    bands::can_manage_band,
    db::{Database, DatabaseError, MemberRole, PrimaryKey, SongStatus},
    CoreContext,
};

mod config;
mod generator;

pub use config::*;
pub use generator::*;

/// Plans rehearsal sessions and keeps each band's scheduling tunables.
pub struct SetlistManager<Db> {
    context: CoreContext<Db>,
}

#[derive(Debug, Error)]
pub enum SetlistError {
    /// The band doesn't exist, or the user can't see it
    #[error("Band not found")]
    BandNotFound,
    #[error("Not permitted to perform this action")]
    NotPermitted,
    #[error("Session duration must be positive")]
    InvalidDuration,
    #[error("Learning ratio must be between 0 and 1")]
    InvalidRatio,
    #[error(transparent)]
    Config(#[from] ConfigFieldError),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

impl<Db> SetlistManager<Db>
where
    Db: Database,
{
    pub fn new(context: &CoreContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Plans a session for the band. Inputs are checked before
    /// anything is loaded.
    pub async fn generate(
        &self,
        user_id: PrimaryKey,
        band_id: PrimaryKey,
        duration_minutes: i32,
        learning_ratio: f64,
    ) -> Result<Setlist, SetlistError> {
        if duration_minutes <= 0 {
            return Err(SetlistError::InvalidDuration);
        }

        if !(0. ..=1.).contains(&learning_ratio) {
            return Err(SetlistError::InvalidRatio);
        }

        self.require_member(band_id, user_id).await?;

        let config = self.config_for(band_id).await?;

        let songs = self
            .context
            .database
            .list_songs(band_id, SongStatus::Active)
            .await?;
        let progress = self.context.database.progress_for_band(band_id).await?;
        let member_ids: Vec<_> = self
            .context
            .database
            .list_members(band_id)
            .await?
            .into_iter()
            .map(|member| member.user.id)
            .collect();

        let setlist = plan(
            &config,
            duration_minutes,
            learning_ratio,
            &songs,
            &progress,
            &member_ids,
        );

        info!(
            "Planned a {} minute session with {} songs for band {}",
            setlist.summary.clustered_minutes,
            setlist.items.len(),
            band_id
        );

        Ok(setlist)
    }

    /// The band's scheduling config, created with defaults on first access
    pub async fn config(
        &self,
        user_id: PrimaryKey,
        band_id: PrimaryKey,
    ) -> Result<SetlistConfigData, SetlistError> {
        self.require_member(band_id, user_id).await?;
        self.config_for(band_id).await
    }

    /// Applies a partial config update. Leaders only, and the whole
    /// update is rejected if any field is out of range.
    pub async fn update_config(
        &self,
        actor: PrimaryKey,
        update: SetlistConfigUpdate,
    ) -> Result<SetlistConfigData, SetlistError> {
        let role = self.require_member(update.band_id, actor).await?;

        if !can_manage_band(Some(role)) {
            return Err(SetlistError::NotPermitted);
        }

        update.validate()?;

        // Make sure the row exists, first access may be a write
        self.config_for(update.band_id).await?;

        Ok(self.context.database.update_setlist_config(update).await?)
    }

    async fn config_for(&self, band_id: PrimaryKey) -> Result<SetlistConfigData, SetlistError> {
        match self.context.database.setlist_config(band_id).await {
            Ok(config) => Ok(config),
            Err(DatabaseError::NotFound { .. }) => {
                let defaults = SetlistConfigData::with_defaults(band_id);

                match self.context.database.create_setlist_config(defaults).await {
                    // Another request created it first, theirs wins
                    Err(DatabaseError::Conflict { .. }) => {
                        Ok(self.context.database.setlist_config(band_id).await?)
                    }
                    result => Ok(result?),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn require_member(
        &self,
        band_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<MemberRole, SetlistError> {
        self.context
            .database
            .member_role(band_id, user_id)
            .await?
            .ok_or(SetlistError::BandNotFound)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::ProgressStatus;
    use crate::test::TestCore;

    #[tokio::test]
    async fn config_appears_with_defaults_on_first_access() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;

        let config = core.setlists.config(leader.id, band.id).await.unwrap();
        assert_eq!(config, SetlistConfigData::with_defaults(band.id));

        // A second access returns the same row
        let again = core.setlists.config(leader.id, band.id).await.unwrap();
        assert_eq!(again, config);
    }

    #[tokio::test]
    async fn config_updates_are_leader_only_and_validated() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let member = core.member(band.id, "bassist@example.com").await;

        let update = SetlistConfigUpdate {
            band_id: band.id,
            break_time_minutes: Some(20),
            ..Default::default()
        };

        let result = core.setlists.update_config(member.id, update).await;
        assert!(matches!(result, Err(SetlistError::NotPermitted)));

        let out_of_range = SetlistConfigUpdate {
            band_id: band.id,
            break_time_minutes: Some(3),
            new_songs_buffer_percent: Some(50.),
            ..Default::default()
        };

        let result = core.setlists.update_config(leader.id, out_of_range).await;
        assert!(matches!(result, Err(SetlistError::Config(_))));

        // The rejected update left nothing behind
        let config = core.setlists.config(leader.id, band.id).await.unwrap();
        assert_eq!(config.new_songs_buffer_percent, 20.);

        let update = SetlistConfigUpdate {
            band_id: band.id,
            break_time_minutes: Some(20),
            break_threshold_minutes: Some(120),
            ..Default::default()
        };

        let config = core.setlists.update_config(leader.id, update).await.unwrap();
        assert_eq!(config.break_time_minutes, 20);
        assert_eq!(config.break_threshold_minutes, 120);
        // Untouched fields keep their values
        assert_eq!(config.time_cluster_minutes, 30);
    }

    #[tokio::test]
    async fn generation_checks_its_inputs_first() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;

        let result = core.setlists.generate(leader.id, band.id, 0, 0.5).await;
        assert!(matches!(result, Err(SetlistError::InvalidDuration)));

        let result = core.setlists.generate(leader.id, band.id, -30, 0.5).await;
        assert!(matches!(result, Err(SetlistError::InvalidDuration)));

        let result = core.setlists.generate(leader.id, band.id, 60, 1.5).await;
        assert!(matches!(result, Err(SetlistError::InvalidRatio)));

        let result = core.setlists.generate(leader.id, band.id, 60, -0.1).await;
        assert!(matches!(result, Err(SetlistError::InvalidRatio)));
    }

    #[tokio::test]
    async fn outsiders_cannot_plan_or_configure() {
        let core = TestCore::new().await;
        let (_, band) = core.band("The Offcuts").await;
        let outsider = core.user("outsider@example.com").await;

        let result = core.setlists.generate(outsider.id, band.id, 60, 0.5).await;
        assert!(matches!(result, Err(SetlistError::BandNotFound)));

        let result = core.setlists.config(outsider.id, band.id).await;
        assert!(matches!(result, Err(SetlistError::BandNotFound)));
    }

    #[tokio::test]
    async fn planning_uses_live_repertoire_and_progress() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;
        let song = core.wishlist_song(leader.id, band.id, "Creep").await;
        core.repertoire.approve_song(leader.id, song.id).await.unwrap();

        // Fresh approval, the leader is still at the bottom of the scale
        let setlist = core
            .setlists
            .generate(leader.id, band.id, 60, 0.5)
            .await
            .unwrap();

        assert_eq!(setlist.items.len(), 1);
        assert_eq!(setlist.items[0].block, SetlistBlock::Learning);

        core.repertoire
            .set_progress(leader.id, song.id, ProgressStatus::Mastered)
            .await
            .unwrap();

        let setlist = core
            .setlists
            .generate(leader.id, band.id, 60, 0.5)
            .await
            .unwrap();

        assert_eq!(setlist.items[0].block, SetlistBlock::Maintenance);
        assert!((setlist.items[0].buffered_minutes - 4.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn updated_config_shapes_the_next_plan() {
        let core = TestCore::new().await;
        let (leader, band) = core.band("The Offcuts").await;

        let setlist = core
            .setlists
            .generate(leader.id, band.id, 95, 0.5)
            .await
            .unwrap();
        assert!(setlist.break_info.is_some());

        let update = SetlistConfigUpdate {
            band_id: band.id,
            break_threshold_minutes: Some(120),
            ..Default::default()
        };
        core.setlists.update_config(leader.id, update).await.unwrap();

        let setlist = core
            .setlists
            .generate(leader.id, band.id, 95, 0.5)
            .await
            .unwrap();
        assert_eq!(setlist.summary.clustered_minutes, 90);
        assert!(setlist.break_info.is_none());
    }
}
