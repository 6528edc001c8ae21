use std::path::PathBuf;

use tokio::{
    sync::mpsc::{self, error::TryRecvError, UnboundedReceiver},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, info, warn, Instrument};

use crate::{
    key_api::{KeyEvent, KeySource},
    utils::{clock::Clock, console},
};

use super::{
    config::{GroupingMode, TrackerConfig},
    error::TrackerError,
    processing::{
        accumulator::{Applied, SessionAccumulator},
        stats::WpmMeter,
    },
    storage::{entities::Session, session_storage::SessionStorage},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Running,
    Stopped,
}

/// Summary handed back once the tracker has stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub sessions_saved: usize,
    pub output_dir: PathBuf,
}

/// Wires a [KeySource] to the [SessionAccumulator] and persists every change through a
/// [SessionStorage]. It is the single owner of session state; key presses reach it through a
/// channel in arrival order.
pub struct TrackerController<S: SessionStorage> {
    state: TrackerState,
    config: TrackerConfig,
    key_source: Box<dyn KeySource>,
    storage: S,
    accumulator: SessionAccumulator,
    wpm: WpmMeter,
    clock: Box<dyn Clock>,
    sessions_saved: usize,
}

impl<S: SessionStorage> TrackerController<S> {
    pub fn new(
        config: TrackerConfig,
        key_source: Box<dyn KeySource>,
        storage: S,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            state: TrackerState::Idle,
            accumulator: SessionAccumulator::new(config.grouping_mode, config.session_gap),
            config,
            key_source,
            storage,
            wpm: WpmMeter::new(),
            clock,
            sessions_saved: 0,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Moves from `Idle` to `Running`: makes sure the output directory exists and subscribes to
    /// the key source. Both failures are fatal.
    pub async fn start(&mut self) -> Result<UnboundedReceiver<KeyEvent>, TrackerError> {
        match self.state {
            TrackerState::Idle => {}
            TrackerState::Running => return Err(TrackerError::AlreadyStarted("running")),
            TrackerState::Stopped => return Err(TrackerError::AlreadyStarted("stopped")),
        }

        self.storage.ensure_dir().await?;

        let (sender, receiver) = mpsc::unbounded_channel::<KeyEvent>();
        self.key_source.listen(sender)?;
        self.state = TrackerState::Running;

        info!(
            "Tracker started in {} mode, saving to {:?}",
            self.config.grouping_mode,
            self.storage.dir()
        );
        console::notice(format!(
            "Typing tracker started ({} mode), saving to: {}",
            self.config.grouping_mode,
            self.storage.dir().display()
        ));
        console::notice("Press Ctrl+C to stop and save");
        Ok(receiver)
    }

    /// Starts the tracker and processes events until the key source closes, a terminate event
    /// arrives or `shutdown` is cancelled. Cancellation wins over pending events, but events
    /// already queued are still applied before the final save.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<ShutdownReport, TrackerError> {
        if shutdown.is_cancelled() {
            return Ok(self.stop().await);
        }
        let mut receiver = self.start().await?;
        let mut next_stats = self
            .config
            .stats_interval
            .map(|interval| self.clock.instant() + interval);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, draining queued events");
                    self.drain(&mut receiver).await;
                    break;
                }
                event = receiver.recv() => match event {
                    Some(event) => {
                        if !self.handle(event).await {
                            break;
                        }
                    }
                    None => {
                        warn!("Key source closed its channel");
                        break;
                    }
                },
                _ = sleep_until(self.clock.as_ref(), next_stats), if next_stats.is_some() => {
                    self.print_stats();
                    next_stats = self
                        .config
                        .stats_interval
                        .map(|interval| self.clock.instant() + interval);
                }
            }
        }

        receiver.close();
        Ok(self.stop().await)
    }

    /// Applies one event and persists the result. Returns false once the tracker should stop.
    /// Persistence failures are reported and swallowed; the session stays in memory so the next
    /// successful save catches up.
    pub async fn handle(&mut self, event: KeyEvent) -> bool {
        let span = debug_span!("Processing key event");
        async {
            debug!("Processing event {:?}", event);
            match self.accumulator.apply(&event) {
                Applied::Continue => {
                    self.sample_words(&event);
                    self.save_current().await;
                    true
                }
                Applied::SessionClosed(closed) => {
                    self.finalize(closed).await;
                    self.wpm.reset();
                    self.sample_words(&event);
                    self.save_current().await;
                    true
                }
                Applied::Terminated(session) => {
                    if let Some(session) = session {
                        self.finalize(session).await;
                    }
                    false
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Finalizes the open session, if any, and releases the key source. Safe to call in any
    /// state; only the first call from `Running` does any work.
    pub async fn stop(&mut self) -> ShutdownReport {
        match self.state {
            TrackerState::Idle => {
                info!("Stopped before the tracker was started");
                self.state = TrackerState::Stopped;
                console::notice("Typing tracker stopped, no sessions were recorded");
            }
            TrackerState::Running => {
                if let Some(session) = self.accumulator.take() {
                    self.finalize(session).await;
                }
                self.key_source.release();
                self.state = TrackerState::Stopped;
                info!("Tracker stopped, {} session(s) saved", self.sessions_saved);
                console::notice("Typing tracker stopped");
                console::notice(format!("Output saved to: {}", self.storage.dir().display()));
            }
            TrackerState::Stopped => {
                debug!("Tracker already stopped");
            }
        }
        self.report()
    }

    fn report(&self) -> ShutdownReport {
        ShutdownReport {
            sessions_saved: self.sessions_saved,
            output_dir: self.storage.dir().to_owned(),
        }
    }

    async fn drain(&mut self, receiver: &mut UnboundedReceiver<KeyEvent>) {
        loop {
            match receiver.try_recv() {
                Ok(event) => {
                    if !self.handle(event).await {
                        return;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
            }
        }
    }

    fn sample_words(&mut self, event: &KeyEvent) {
        if !event.kind.completes_word() {
            return;
        }
        if let Some(session) = self.accumulator.current() {
            self.wpm.record(event.timestamp, session.word_count);
        }
    }

    /// Re-writes the open session after a change.
    async fn save_current(&mut self) {
        let Some(session) = self.accumulator.current() else {
            return;
        };
        let first_save = session.keystroke_count == 1;
        match self.storage.save_session(session).await {
            Ok(path) => {
                if first_save {
                    let name = path.file_name().unwrap_or_default().to_string_lossy();
                    info!("Session started: {name}");
                    console::notice(format!("Session started: {name}"));
                }
            }
            Err(e) => report_persistence_error("saving the current session", &e),
        }
    }

    /// Last write of a closed session and, in daily mode, its merge into the day's log.
    async fn finalize(&mut self, session: Session) {
        let mut saved = match self.storage.save_session(&session).await {
            Ok(path) => {
                info!("Session saved to {path:?}");
                true
            }
            Err(e) => {
                report_persistence_error("saving the finished session", &e);
                false
            }
        };

        if self.config.grouping_mode == GroupingMode::Daily {
            match self
                .storage
                .merge_into_daily_log(&session, self.clock.now())
                .await
            {
                Ok(path) => info!("Merged session into {path:?}"),
                Err(e) => {
                    report_persistence_error("updating the daily log", &e);
                    saved = false;
                }
            }
        }

        self.storage.release_session(&session);
        if saved {
            self.sessions_saved += 1;
            console::success(format!(
                "Session saved: {} chars, {} words",
                session.character_count, session.word_count
            ));
        }
    }

    fn print_stats(&self) {
        let Some(session) = self.accumulator.current() else {
            return;
        };
        let wpm = self.wpm.wpm(self.clock.now());
        console::stats(format!(
            "Words: {} | WPM (1min): {wpm:.1}",
            session.word_count
        ));
    }
}

async fn sleep_until(clock: &dyn Clock, instant: Option<Instant>) {
    match instant {
        Some(instant) => clock.sleep_until(instant).await,
        None => std::future::pending().await,
    }
}

fn report_persistence_error(action: &str, e: &impl std::fmt::Display) {
    error!("Persistence failed while {action}: {e}");
    console::failure(format!("Persistence failed while {action}: {e}"));
}
