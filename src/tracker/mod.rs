use controller::{ShutdownReport, TrackerController};
use error::TrackerError;
use storage::session_storage::JsonSessionStorage;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    key_api::{GenericKeySource, KeySource},
    utils::clock::{Clock, DefaultClock},
};

pub use config::{GroupingMode, TrackerConfig};

pub mod config;
pub mod controller;
pub mod error;
pub mod processing;
pub mod shutdown;
pub mod storage;

/// Represents the starting point for the tracker. Runs in the foreground until Ctrl+C and
/// returns once the last session is on disk.
pub async fn start_tracker(config: TrackerConfig) -> Result<ShutdownReport, TrackerError> {
    let key_source = GenericKeySource::new()?;
    let shutdown_token = CancellationToken::new();

    let controller = create_controller(config, key_source, DefaultClock);
    let signals = tokio::spawn(shutdown::detect_shutdown(shutdown_token.clone()));

    let result = controller.run(shutdown_token.clone()).await;

    // Also releases the signal listener when the tracker stopped on its own.
    shutdown_token.cancel();
    if let Err(e) = signals.await {
        error!("Signal listener ended abnormally {e:?}");
    }

    if let Ok(report) = &result {
        info!("Shutdown complete, {} session(s) saved", report.sessions_saved);
    }
    result
}

fn create_controller(
    config: TrackerConfig,
    key_source: impl KeySource + 'static,
    clock: impl Clock,
) -> TrackerController<JsonSessionStorage> {
    let storage = JsonSessionStorage::new(config.output_dir.clone());
    TrackerController::new(config, Box::new(key_source), storage, Box::new(clock))
}
