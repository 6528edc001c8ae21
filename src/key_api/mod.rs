//! Contains logic for receiving key presses from the operating system.
//! [GenericKeySource] is the main artifact of this module that abstracts
//! the platform backends.

#[cfg(feature = "rdev")]
pub mod rdev_hook;

use chrono::NaiveDateTime;
use tokio::sync::mpsc::UnboundedSender;

use crate::{tracker::error::TrackerError, utils::time::to_record_precision};

/// What a single key press means for the typed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Character(char),
    Space,
    Backspace,
    Tab,
    Enter,
    /// Modifiers, arrows, function keys. Counted as keystrokes but never change the text.
    OtherSpecial,
    /// Asks the tracker to finalize and stop.
    Terminate,
}

impl KeyKind {
    /// Keys after which a word is considered finished.
    pub fn completes_word(&self) -> bool {
        matches!(
            self,
            KeyKind::Space | KeyKind::Enter | KeyKind::Character(' ' | '\r' | '\n')
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyKind,
    pub timestamp: NaiveDateTime,
}

impl KeyEvent {
    pub fn new(kind: KeyKind, timestamp: NaiveDateTime) -> Self {
        Self {
            kind,
            timestamp: to_record_precision(timestamp),
        }
    }
}

/// Intended to serve as a contract platform keyboard hooks must implement. Implementations push
/// from whatever thread the OS calls them on; the channel serializes events for the tracker.
#[cfg_attr(test, mockall::automock)]
pub trait KeySource: Send {
    /// Starts delivering key presses into `sink`. Fails when the hook can't be installed, for
    /// example because the OS didn't grant input monitoring.
    fn listen(&mut self, sink: UnboundedSender<KeyEvent>) -> Result<(), TrackerError>;

    /// Stops delivering events. Calling it more than once is harmless.
    fn release(&mut self);
}

/// Serves as a cross-compatible KeySource implementation.
pub struct GenericKeySource {
    inner: Box<dyn KeySource>,
}

impl GenericKeySource {
    pub fn new() -> Result<Self, TrackerError> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rdev")] {
                Ok(Self {
                    inner: Box::new(rdev_hook::RdevKeySource::new()),
                })
            }
            else {
                Err(TrackerError::key_source_unavailable(
                    "keytrail was built without a keyboard backend",
                    "Rebuild with `--features rdev`.",
                ))
            }
        }
    }
}

impl KeySource for GenericKeySource {
    fn listen(&mut self, sink: UnboundedSender<KeyEvent>) -> Result<(), TrackerError> {
        self.inner.listen(sink)
    }

    fn release(&mut self) {
        self.inner.release()
    }
}
