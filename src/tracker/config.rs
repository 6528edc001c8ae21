use std::{fmt::Display, path::PathBuf, time::Duration};

use chrono::TimeDelta;
use clap::ValueEnum;

use super::error::TrackerError;

pub const DEFAULT_SESSION_GAP_SECONDS: f64 = 5.0;
pub const DEFAULT_STATS_INTERVAL_SECONDS: u64 = 5;

/// How pauses in typing are turned into structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GroupingMode {
    /// A pause closes the session. Closed sessions are collected into one log per day.
    Daily,
    /// One session per run. A pause inserts a paragraph break.
    #[default]
    Continuous,
}

impl Display for GroupingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupingMode::Daily => write!(f, "daily"),
            GroupingMode::Continuous => write!(f, "continuous"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub output_dir: PathBuf,
    pub session_gap: TimeDelta,
    pub grouping_mode: GroupingMode,
    /// How often the words/WPM line is printed. `None` disables it.
    pub stats_interval: Option<Duration>,
}

impl TrackerConfig {
    pub fn new(
        output_dir: PathBuf,
        session_gap_seconds: f64,
        grouping_mode: GroupingMode,
        stats_interval_seconds: u64,
    ) -> Result<Self, TrackerError> {
        Ok(Self {
            output_dir,
            session_gap: gap_from_seconds(session_gap_seconds)?,
            grouping_mode,
            stats_interval: (stats_interval_seconds > 0)
                .then(|| Duration::from_secs(stats_interval_seconds)),
        })
    }

    pub fn with_defaults(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            session_gap: TimeDelta::seconds(DEFAULT_SESSION_GAP_SECONDS as i64),
            grouping_mode: GroupingMode::default(),
            stats_interval: Some(Duration::from_secs(DEFAULT_STATS_INTERVAL_SECONDS)),
        }
    }
}

fn gap_from_seconds(seconds: f64) -> Result<TimeDelta, TrackerError> {
    if !seconds.is_finite() || seconds <= 0. {
        return Err(TrackerError::InvalidConfig(format!(
            "session gap must be a positive number of seconds, got {seconds}"
        )));
    }
    let micros = (seconds * 1_000_000.).round();
    if micros > i64::MAX as f64 {
        return Err(TrackerError::InvalidConfig(format!(
            "session gap of {seconds} seconds is too large"
        )));
    }
    Ok(TimeDelta::microseconds(micros as i64))
}
