use std::path::PathBuf;

use clap::Parser;
use tracing::{info, level_filters::LevelFilter};

use crate::{
    tracker::{
        config::{DEFAULT_SESSION_GAP_SECONDS, DEFAULT_STATS_INTERVAL_SECONDS},
        error::TrackerError,
        start_tracker, GroupingMode, TrackerConfig,
    },
    utils::{
        console,
        dir::{default_output_dir, log_dir},
        logging::{enable_logging, TRACKER_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "keytrail", version, long_about = None)]
#[command(about = "Records what you type into timestamped JSON session files. Stop with Ctrl+C.")]
pub struct Args {
    #[arg(
        long,
        help = "Output directory. By default $KEYTRAIL_OUTPUT_DIR, otherwise keytrail/sessions in the platform state directory"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long = "gap",
        value_name = "SECONDS",
        default_value_t = DEFAULT_SESSION_GAP_SECONDS,
        help = "Pause that ends a session (daily mode) or starts a new paragraph (continuous mode)"
    )]
    session_gap_seconds: f64,
    #[arg(long, value_enum, default_value_t = GroupingMode::Continuous)]
    mode: GroupingMode,
    #[arg(
        long = "stats-interval",
        value_name = "SECONDS",
        default_value_t = DEFAULT_STATS_INTERVAL_SECONDS,
        help = "How often to print word count and WPM. 0 disables it"
    )]
    stats_interval_seconds: u64,
    /// Mirror log output on the console. This option is for debugging purposes only.
    #[arg(long = "log-console")]
    log_console: bool,
    #[arg(long = "log-filter")]
    log: Option<LevelFilter>,
}

impl Args {
    fn into_config(self) -> Result<TrackerConfig, TrackerError> {
        let output_dir = match self.dir {
            Some(dir) => dir,
            None => default_output_dir().map_err(|e| TrackerError::InvalidConfig(e.to_string()))?,
        };
        TrackerConfig::new(
            output_dir,
            self.session_gap_seconds,
            self.mode,
            self.stats_interval_seconds,
        )
    }
}

/// Parses arguments, sets up logging and runs the tracker in the foreground. Fatal errors come
/// back as [TrackerError] so the caller can choose the exit code.
pub async fn run_cli() -> Result<(), TrackerError> {
    let args = Args::parse();
    let log_console = args.log_console;
    let log_level = args.log;
    let config = args.into_config()?;

    if let Err(e) = log_dir()
        .and_then(|dir| enable_logging(TRACKER_PREFIX, &dir, log_level, log_console))
    {
        console::failure(format!("Logging is disabled: {e:#}"));
    }
    info!("Starting with {config:?}");

    let report = start_tracker(config).await?;
    console::success(format!(
        "{} session(s) saved to {}",
        report.sessions_saved,
        report.output_dir.display()
    ));
    Ok(())
}
