use chrono::NaiveDate;

use crate::db::{PrimaryKey, ProgressData, SongData};

use super::SetlistConfigData;

/// Which half of the session an item was scheduled into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetlistBlock {
    Learning,
    Maintenance,
}

impl SetlistBlock {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learning => "learning",
            Self::Maintenance => "maintenance",
        }
    }
}

/// A scheduled song
#[derive(Debug, Clone)]
pub struct SetlistItem {
    pub song_id: PrimaryKey,
    pub title: String,
    pub artist: String,
    pub block: SetlistBlock,
    /// Scheduled length in minutes, buffer included
    pub buffered_minutes: f64,
    /// Mean progress ordinal across members with a record.
    /// Only learning entries carry one.
    pub readiness_score: Option<f64>,
    pub last_rehearsed_on: Option<NaiveDate>,
    /// Running total of buffered minutes up to and including this item
    pub cumulative_minutes: f64,
}

/// A suggested pause. Purely advisory, it consumes no schedule time
/// and doesn't split the item list.
#[derive(Debug, Clone)]
pub struct BreakInfo {
    pub minutes: i32,
    pub position: String,
}

#[derive(Debug, Clone)]
pub struct SetlistSummary {
    pub requested_minutes: i32,
    pub clustered_minutes: i32,
    pub learning_minutes_allocated: i32,
    pub maintenance_minutes_allocated: i32,
    pub learning_minutes_used: f64,
    pub maintenance_minutes_used: f64,
    pub learning_ratio: f64,
    /// The configuration the plan was derived from
    pub config: SetlistConfigData,
}

#[derive(Debug, Clone)]
pub struct Setlist {
    pub items: Vec<SetlistItem>,
    pub break_info: Option<BreakInfo>,
    pub summary: SetlistSummary,
}

struct PoolEntry<'s> {
    song: &'s SongData,
    readiness: f64,
}

/// Plans a rehearsal session out of a band's active songs.
///
/// Songs every current member can already play land in the maintenance
/// pool, sorted by how long ago they were last rehearsed. Everything
/// else lands in the learning pool, sorted by how close the band is to
/// having it down. Both pools are then greedily packed into their share
/// of the clustered session time.
///
/// Inputs are assumed validated and `songs` is expected in creation
/// order, which is what breaks sorting ties.
pub fn plan(
    config: &SetlistConfigData,
    requested_minutes: i32,
    learning_ratio: f64,
    songs: &[SongData],
    progress: &[ProgressData],
    member_ids: &[PrimaryKey],
) -> Setlist {
    let clustered_minutes = config.clustered_duration(requested_minutes);

    let learning_budget = (clustered_minutes as f64 * learning_ratio).round() as i32;
    let maintenance_budget = clustered_minutes - learning_budget;

    let mut learning_pool = Vec::new();
    let mut maintenance_pool = Vec::new();

    for song in songs {
        // Records of people who since left the band don't count
        let records: Vec<_> = progress
            .iter()
            .filter(|p| p.song_id == song.id && member_ids.contains(&p.user_id))
            .collect();

        let everyone_ready = member_ids.iter().all(|member| {
            records
                .iter()
                .any(|p| p.user_id == *member && p.status.is_rehearsal_ready())
        });

        if everyone_ready {
            maintenance_pool.push(PoolEntry {
                song,
                readiness: 0.,
            });
        } else {
            let readiness = if records.is_empty() {
                0.
            } else {
                let total: u32 = records.iter().map(|p| p.status.ordinal() as u32).sum();
                total as f64 / records.len() as f64
            };

            learning_pool.push(PoolEntry { song, readiness });
        }
    }

    // Closest to ready first. Stable, so ties keep creation order.
    learning_pool.sort_by(|a, b| b.readiness.total_cmp(&a.readiness));
    // Most overdue first, treating never-rehearsed as most overdue of all
    maintenance_pool.sort_by(|a, b| a.song.last_rehearsed_on.cmp(&b.song.last_rehearsed_on));

    let (learning_items, learning_used) =
        fill_block(config, &learning_pool, learning_budget, SetlistBlock::Learning);
    let (maintenance_items, maintenance_used) = fill_block(
        config,
        &maintenance_pool,
        maintenance_budget,
        SetlistBlock::Maintenance,
    );

    let mut items: Vec<_> = learning_items
        .into_iter()
        .chain(maintenance_items)
        .collect();

    let mut cumulative = 0.;
    for item in items.iter_mut() {
        cumulative += item.buffered_minutes;
        item.cumulative_minutes = cumulative;
    }

    let break_info = config.is_break_needed(clustered_minutes).then(|| BreakInfo {
        minutes: config.break_time_minutes,
        position: "mid-session".to_string(),
    });

    Setlist {
        items,
        break_info,
        summary: SetlistSummary {
            requested_minutes,
            clustered_minutes,
            learning_minutes_allocated: learning_budget,
            maintenance_minutes_allocated: maintenance_budget,
            learning_minutes_used: learning_used,
            maintenance_minutes_used: maintenance_used,
            learning_ratio,
            config: config.clone(),
        },
    }
}

/// Greedy first-fit over an already sorted pool. Songs that would
/// overflow the budget are skipped, not truncated, and later smaller
/// songs still get their chance. Songs without a known duration can't
/// be scheduled at all.
fn fill_block(
    config: &SetlistConfigData,
    pool: &[PoolEntry],
    budget_minutes: i32,
    block: SetlistBlock,
) -> (Vec<SetlistItem>, f64) {
    let is_learned = block == SetlistBlock::Maintenance;

    let mut items = Vec::new();
    let mut used = 0.;

    for entry in pool {
        let Some(seconds) = entry.song.duration_seconds else {
            continue;
        };

        let buffered = config.duration_with_buffer(seconds, is_learned);

        if used + buffered > budget_minutes as f64 {
            continue;
        }

        used += buffered;
        items.push(SetlistItem {
            song_id: entry.song.id,
            title: entry.song.title.clone(),
            artist: entry.song.artist.clone(),
            block,
            buffered_minutes: buffered,
            readiness_score: (block == SetlistBlock::Learning).then_some(entry.readiness),
            last_rehearsed_on: entry.song.last_rehearsed_on,
            cumulative_minutes: 0.,
        });
    }

    (items, used)
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::db::{ProgressStatus, SongStatus};

    fn song(id: PrimaryKey, seconds: Option<i32>, rehearsed: Option<NaiveDate>) -> SongData {
        SongData {
            id,
            band_id: 1,
            title: format!("Song {}", id),
            artist: "Artist".to_string(),
            status: SongStatus::Active,
            duration_seconds: seconds,
            last_rehearsed_on: rehearsed,
            external_track_id: None,
            album_art_url: None,
            created_at: Utc::now(),
        }
    }

    fn record(user_id: PrimaryKey, song_id: PrimaryKey, status: ProgressStatus) -> ProgressData {
        ProgressData {
            user_id,
            song_id,
            status,
            updated_at: Utc::now(),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn a_song_everyone_mastered_goes_to_maintenance() {
        let config = SetlistConfigData::with_defaults(1);
        let songs = [song(1, Some(240), None)];
        let progress = [record(1, 1, ProgressStatus::Mastered)];

        let setlist = plan(&config, 60, 0.5, &songs, &progress, &[1]);

        assert_eq!(setlist.summary.clustered_minutes, 60);
        assert_eq!(setlist.summary.learning_minutes_allocated, 30);
        assert_eq!(setlist.summary.maintenance_minutes_allocated, 30);

        assert_eq!(setlist.items.len(), 1);
        assert_eq!(setlist.items[0].block, SetlistBlock::Maintenance);
        assert!(close(setlist.items[0].buffered_minutes, 4.4));
        assert!(close(setlist.summary.maintenance_minutes_used, 4.4));
        assert!(close(setlist.summary.learning_minutes_used, 0.));
    }

    #[test]
    fn a_song_still_in_practice_goes_to_learning() {
        let config = SetlistConfigData::with_defaults(1);
        let songs = [song(1, Some(240), None)];
        let progress = [record(1, 1, ProgressStatus::InPractice)];

        let setlist = plan(&config, 60, 0.5, &songs, &progress, &[1]);

        assert_eq!(setlist.items.len(), 1);
        assert_eq!(setlist.items[0].block, SetlistBlock::Learning);
        assert!(close(setlist.items[0].buffered_minutes, 4.8));
        assert!(close(setlist.summary.learning_minutes_used, 4.8));
        assert!(close(setlist.summary.maintenance_minutes_used, 0.));
    }

    #[test]
    fn one_unready_member_keeps_a_song_in_learning() {
        let config = SetlistConfigData::with_defaults(1);
        let songs = [song(1, Some(240), None)];
        let progress = [
            record(1, 1, ProgressStatus::Mastered),
            record(2, 1, ProgressStatus::ReadyForRehearsal),
            record(3, 1, ProgressStatus::InPractice),
        ];

        let setlist = plan(&config, 60, 0.5, &songs, &progress, &[1, 2, 3]);

        assert_eq!(setlist.items[0].block, SetlistBlock::Learning);
        // (4 + 3 + 2) / 3
        assert!(close(setlist.items[0].readiness_score.unwrap(), 3.));
    }

    #[test]
    fn a_member_without_a_record_counts_as_not_ready() {
        let config = SetlistConfigData::with_defaults(1);
        let songs = [song(1, Some(240), None)];
        let progress = [record(1, 1, ProgressStatus::Mastered)];

        let setlist = plan(&config, 60, 0.5, &songs, &progress, &[1, 2]);

        assert_eq!(setlist.items[0].block, SetlistBlock::Learning);
        // Only the existing record is averaged
        assert!(close(setlist.items[0].readiness_score.unwrap(), 4.));
    }

    #[test]
    fn records_of_former_members_are_ignored() {
        let config = SetlistConfigData::with_defaults(1);
        let songs = [song(1, Some(240), None)];
        // User 2 mastered the song but left the band
        let progress = [record(2, 1, ProgressStatus::Mastered)];

        let setlist = plan(&config, 60, 0.5, &songs, &progress, &[1]);

        assert_eq!(setlist.items[0].block, SetlistBlock::Learning);
        assert!(close(setlist.items[0].readiness_score.unwrap(), 0.));
    }

    #[test]
    fn learning_is_ordered_by_readiness_with_stable_ties() {
        let config = SetlistConfigData::with_defaults(1);
        let songs = [
            song(1, Some(60), None),
            song(2, Some(60), None),
            song(3, Some(60), None),
            song(4, Some(60), None),
        ];
        let progress = [
            record(1, 1, ProgressStatus::InPractice),
            record(1, 3, ProgressStatus::ReadyForRehearsal),
        ];

        let setlist = plan(&config, 60, 1., &songs, &progress, &[1, 2]);

        let order: Vec<_> = setlist.items.iter().map(|i| i.song_id).collect();
        // Song 3 scores 3.0, song 1 scores 2.0, songs 2 and 4 tie at
        // zero and keep their creation order
        assert_eq!(order, vec![3, 1, 2, 4]);
    }

    #[test]
    fn maintenance_schedules_the_most_overdue_first() {
        let config = SetlistConfigData::with_defaults(1);
        let day = |d| NaiveDate::from_ymd_opt(2024, 11, d);
        let songs = [
            song(1, Some(60), day(20)),
            song(2, Some(60), None),
            song(3, Some(60), day(5)),
        ];
        let progress = [
            record(1, 1, ProgressStatus::Mastered),
            record(1, 2, ProgressStatus::Mastered),
            record(1, 3, ProgressStatus::Mastered),
        ];

        let setlist = plan(&config, 60, 0., &songs, &progress, &[1]);

        let order: Vec<_> = setlist.items.iter().map(|i| i.song_id).collect();
        // Never rehearsed first, then oldest date
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn an_oversized_song_is_skipped_and_smaller_ones_still_fit() {
        let config = SetlistConfigData::with_defaults(1);
        // Buffered at 20%: 50, 50 and 10 minutes against a budget of 60
        let songs = [
            song(1, Some(2500), None),
            song(2, Some(2500), None),
            song(3, Some(500), None),
        ];

        let setlist = plan(&config, 120, 0.5, &songs, &[], &[1]);

        assert_eq!(setlist.summary.learning_minutes_allocated, 60);

        let order: Vec<_> = setlist.items.iter().map(|i| i.song_id).collect();
        assert_eq!(order, vec![1, 3]);

        assert!(close(setlist.items[0].cumulative_minutes, 50.));
        assert!(close(setlist.items[1].cumulative_minutes, 60.));
        assert!(close(setlist.summary.learning_minutes_used, 60.));
    }

    #[test]
    fn budgets_are_never_exceeded() {
        let config = SetlistConfigData::with_defaults(1);
        let songs: Vec<_> = (1..=12).map(|id| song(id, Some(300 + id * 17), None)).collect();
        let progress: Vec<_> = (1..=6)
            .map(|id| record(1, id, ProgressStatus::Mastered))
            .collect();

        let setlist = plan(&config, 60, 0.4, &songs, &progress, &[1]);

        let used = |block| {
            setlist
                .items
                .iter()
                .filter(|i| i.block == block)
                .map(|i| i.buffered_minutes)
                .sum::<f64>()
        };

        assert!(used(SetlistBlock::Learning) <= 24.);
        assert!(used(SetlistBlock::Maintenance) <= 36.);
    }

    #[test]
    fn every_song_lands_in_exactly_one_pool() {
        let config = SetlistConfigData::with_defaults(1);
        let songs = [
            song(1, Some(60), None),
            song(2, Some(60), None),
            song(3, Some(60), None),
        ];
        let progress = [
            record(1, 1, ProgressStatus::Mastered),
            record(1, 2, ProgressStatus::ToListen),
        ];

        // A generous budget so nothing is dropped for lack of time
        let setlist = plan(&config, 240, 0.5, &songs, &progress, &[1]);

        let mut scheduled: Vec<_> = setlist.items.iter().map(|i| i.song_id).collect();
        scheduled.sort();
        assert_eq!(scheduled, vec![1, 2, 3]);

        for item in &setlist.items {
            match item.song_id {
                1 => assert_eq!(item.block, SetlistBlock::Maintenance),
                _ => assert_eq!(item.block, SetlistBlock::Learning),
            }
        }
    }

    #[test]
    fn songs_without_a_duration_cannot_be_scheduled() {
        let config = SetlistConfigData::with_defaults(1);
        let songs = [song(1, None, None), song(2, Some(240), None)];

        let setlist = plan(&config, 60, 1., &songs, &[], &[1]);

        assert_eq!(setlist.items.len(), 1);
        assert_eq!(setlist.items[0].song_id, 2);
    }

    #[test]
    fn a_zero_ratio_gives_learning_songs_no_time() {
        let config = SetlistConfigData::with_defaults(1);
        let songs = [song(1, Some(240), None)];

        let setlist = plan(&config, 60, 0., &songs, &[], &[1]);

        assert_eq!(setlist.summary.learning_minutes_allocated, 0);
        assert_eq!(setlist.summary.maintenance_minutes_allocated, 60);
        assert!(setlist.items.is_empty());
    }

    #[test]
    fn long_sessions_get_a_break() {
        let config = SetlistConfigData::with_defaults(1);

        let setlist = plan(&config, 95, 0.5, &[], &[], &[1]);

        // 95 clusters down to 90, which is exactly at the threshold
        assert_eq!(setlist.summary.clustered_minutes, 90);

        let info = setlist.break_info.expect("a break is suggested");
        assert_eq!(info.minutes, 10);
        assert_eq!(info.position, "mid-session");
    }

    #[test]
    fn short_sessions_get_no_break() {
        let config = SetlistConfigData::with_defaults(1);

        let setlist = plan(&config, 60, 0.5, &[], &[], &[1]);

        assert!(setlist.break_info.is_none());
        assert!(setlist.items.is_empty());
        assert!(close(setlist.summary.learning_minutes_used, 0.));
    }
}
