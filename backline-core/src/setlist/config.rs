use thiserror::Error;

use crate::db::PrimaryKey;

/// Per-band tunables governing how a setlist is laid out in time.
/// Every band gets one, created with defaults the first time it is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct SetlistConfigData {
    pub band_id: PrimaryKey,
    /// Extra rehearsal time on songs still being learned, as a percentage
    pub new_songs_buffer_percent: f64,
    /// Extra rehearsal time on songs the band already knows, as a percentage
    pub learned_songs_buffer_percent: f64,
    /// How long the mid-session break lasts
    pub break_time_minutes: i32,
    /// Sessions at or above this length get a break
    pub break_threshold_minutes: i32,
    pub min_session_minutes: i32,
    pub max_session_minutes: i32,
    /// Session lengths snap to multiples of this
    pub time_cluster_minutes: i32,
}

/// A validated partial update to a band's setlist config.
/// Fields left as `None` keep their current value.
#[derive(Debug, Default)]
pub struct SetlistConfigUpdate {
    pub band_id: PrimaryKey,
    pub new_songs_buffer_percent: Option<f64>,
    pub learned_songs_buffer_percent: Option<f64>,
    pub break_time_minutes: Option<i32>,
    pub break_threshold_minutes: Option<i32>,
    pub min_session_minutes: Option<i32>,
    pub max_session_minutes: Option<i32>,
    pub time_cluster_minutes: Option<i32>,
}

/// Returned when a config field is set outside its allowed range
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field} must be between {min} and {max}")]
pub struct ConfigFieldError {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
}

impl SetlistConfigData {
    pub fn with_defaults(band_id: PrimaryKey) -> Self {
        Self {
            band_id,
            ..Default::default()
        }
    }

    /// Snaps a requested session length to the nearest cluster multiple,
    /// keeping the result within the configured session bounds.
    ///
    /// The value is clamped before rounding and again after, since rounding
    /// can push a value that sat exactly on a bound back outside it.
    pub fn clustered_duration(&self, requested_minutes: i32) -> i32 {
        let clamped = requested_minutes.clamp(self.min_session_minutes, self.max_session_minutes);

        let cluster = self.time_cluster_minutes;
        let clusters = (clamped as f64 / cluster as f64).round() as i32;

        (clusters * cluster).clamp(self.min_session_minutes, self.max_session_minutes)
    }

    /// Whether a session of this length is long enough to warrant a break
    pub fn is_break_needed(&self, session_minutes: i32) -> bool {
        session_minutes >= self.break_threshold_minutes
    }

    /// Converts a song's playing length to rehearsal minutes, padded with
    /// the buffer that applies to its learning state.
    pub fn duration_with_buffer(&self, duration_seconds: i32, is_learned: bool) -> f64 {
        let buffer_percent = if is_learned {
            self.learned_songs_buffer_percent
        } else {
            self.new_songs_buffer_percent
        };

        (duration_seconds as f64 / 60.) * (1. + buffer_percent / 100.)
    }
}

impl Default for SetlistConfigData {
    fn default() -> Self {
        Self {
            band_id: 0,
            new_songs_buffer_percent: 20.,
            learned_songs_buffer_percent: 10.,
            break_time_minutes: 10,
            break_threshold_minutes: 90,
            min_session_minutes: 30,
            max_session_minutes: 240,
            time_cluster_minutes: 30,
        }
    }
}

impl SetlistConfigUpdate {
    /// Checks every provided field against its allowed range.
    /// Nothing should be written unless the whole update passes.
    pub fn validate(&self) -> Result<(), ConfigFieldError> {
        check_range(
            "new_songs_buffer_percent",
            self.new_songs_buffer_percent,
            0.,
            100.,
        )?;
        check_range(
            "learned_songs_buffer_percent",
            self.learned_songs_buffer_percent,
            0.,
            100.,
        )?;
        check_range(
            "break_time_minutes",
            self.break_time_minutes.map(f64::from),
            5.,
            30.,
        )?;
        check_range(
            "break_threshold_minutes",
            self.break_threshold_minutes.map(f64::from),
            60.,
            180.,
        )?;
        check_range(
            "min_session_minutes",
            self.min_session_minutes.map(f64::from),
            15.,
            60.,
        )?;
        check_range(
            "max_session_minutes",
            self.max_session_minutes.map(f64::from),
            120.,
            300.,
        )?;
        check_range(
            "time_cluster_minutes",
            self.time_cluster_minutes.map(f64::from),
            15.,
            60.,
        )?;

        Ok(())
    }

    /// The config as it would look with this update applied
    pub fn apply_to(&self, current: &SetlistConfigData) -> SetlistConfigData {
        SetlistConfigData {
            band_id: current.band_id,
            new_songs_buffer_percent: self
                .new_songs_buffer_percent
                .unwrap_or(current.new_songs_buffer_percent),
            learned_songs_buffer_percent: self
                .learned_songs_buffer_percent
                .unwrap_or(current.learned_songs_buffer_percent),
            break_time_minutes: self.break_time_minutes.unwrap_or(current.break_time_minutes),
            break_threshold_minutes: self
                .break_threshold_minutes
                .unwrap_or(current.break_threshold_minutes),
            min_session_minutes: self
                .min_session_minutes
                .unwrap_or(current.min_session_minutes),
            max_session_minutes: self
                .max_session_minutes
                .unwrap_or(current.max_session_minutes),
            time_cluster_minutes: self
                .time_cluster_minutes
                .unwrap_or(current.time_cluster_minutes),
        }
    }
}

fn check_range(
    field: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) -> Result<(), ConfigFieldError> {
    match value {
        Some(v) if v < min || v > max => Err(ConfigFieldError { field, min, max }),
        _ => Ok(()),
    }
}
