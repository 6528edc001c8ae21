use std::process::ExitCode;

use keytrail::{cli::run_cli, utils::console};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    match run_cli().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error running tracker {e:?}");
            console::failure(&e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
