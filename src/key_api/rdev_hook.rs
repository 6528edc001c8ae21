use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self as std_mpsc, RecvTimeoutError},
        Arc,
    },
    thread,
    time::Duration,
};

use chrono::{DateTime, Local};
use rdev::{listen, EventType, Key};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, trace};

use crate::tracker::error::TrackerError;

use super::{KeyEvent, KeyKind, KeySource};

/// Hook installation errors are reported by `rdev::listen` returning right away. If nothing
/// arrives within this window the hook is considered live.
const STARTUP_GRACE: Duration = Duration::from_millis(300);

/// Global keyboard hook backed by `rdev`. `rdev::listen` never returns once installed, so the
/// listener thread lives until the process exits; [KeySource::release] only mutes it.
pub struct RdevKeySource {
    active: Arc<AtomicBool>,
}

impl RdevKeySource {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for RdevKeySource {
    fn default() -> Self {
        Self::new()
    }
}

fn remediation() -> &'static str {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "macos")] {
            "Grant this terminal Accessibility and Input Monitoring access in System Settings > Privacy & Security, then restart it."
        } else if #[cfg(windows)] {
            "Make sure the process runs in an interactive desktop session."
        } else {
            "Run inside an X11 session with DISPLAY set and the XRecord extension available."
        }
    }
}

/// Maps an rdev key press to what it does to the text. `name` is the string the key produced,
/// which is how printable characters are told apart from everything else.
fn key_kind(key: Key, name: Option<&str>) -> KeyKind {
    match key {
        Key::Space => KeyKind::Space,
        Key::Backspace => KeyKind::Backspace,
        Key::Tab => KeyKind::Tab,
        Key::Return | Key::KpReturn => KeyKind::Enter,
        _ => {
            let mut chars = name.unwrap_or_default().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if !c.is_control() => KeyKind::Character(c),
                _ => KeyKind::OtherSpecial,
            }
        }
    }
}

impl KeySource for RdevKeySource {
    fn listen(&mut self, sink: UnboundedSender<KeyEvent>) -> Result<(), TrackerError> {
        let (failure_sender, failure_receiver) = std_mpsc::channel::<String>();
        let active = self.active.clone();
        active.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name("keytrail-keyboard".into())
            .spawn(move || {
                let result = listen(move |event| {
                    if !active.load(Ordering::Relaxed) {
                        return;
                    }
                    if let EventType::KeyPress(key) = event.event_type {
                        let timestamp = DateTime::<Local>::from(event.time).naive_local();
                        let kind = key_kind(key, event.name.as_deref());
                        if sink.send(KeyEvent::new(kind, timestamp)).is_err() {
                            trace!("Dropping key press, tracker is gone");
                        }
                    }
                });
                if let Err(e) = result {
                    error!("Keyboard listener failed {e:?}");
                    let _ = failure_sender.send(format!("{e:?}"));
                }
            })
            .map_err(|e| {
                TrackerError::key_source_unavailable(
                    format!("couldn't spawn the listener thread: {e}"),
                    remediation(),
                )
            })?;

        match failure_receiver.recv_timeout(STARTUP_GRACE) {
            Err(RecvTimeoutError::Timeout) => {
                info!("Keyboard hook installed");
                Ok(())
            }
            Ok(reason) => {
                self.active.store(false, Ordering::SeqCst);
                Err(TrackerError::key_source_unavailable(reason, remediation()))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.active.store(false, Ordering::SeqCst);
                Err(TrackerError::key_source_unavailable(
                    "the listener exited immediately",
                    remediation(),
                ))
            }
        }
    }

    fn release(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}
