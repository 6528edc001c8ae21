use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Waits for Ctrl+C (SIGINT, or the console control event on Windows) and turns it into a
/// cancellation of `cancelation`. Returns early if the token is cancelled some other way.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Interrupt received"),
                Err(e) => error!("Couldn't listen for the interrupt signal {e:?}"),
            }
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
