use std::path::PathBuf;

use thiserror::Error;

/// Failures of the tracker as a whole. Only startup failures are fatal; anything raised while
/// events are flowing is logged by the controller and processing continues.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Key listening is unavailable: {reason}. {remediation}")]
    KeySourceUnavailable { reason: String, remediation: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tracker can't be started again, it is already {0}")]
    AlreadyStarted(&'static str),
}

impl TrackerError {
    pub fn key_source_unavailable(reason: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self::KeySourceUnavailable {
            reason: reason.into(),
            remediation: remediation.into(),
        }
    }

    /// Process exit code for a fatal error.
    pub fn exit_code(&self) -> i32 {
        match self {
            TrackerError::KeySourceUnavailable { .. } => 3,
            TrackerError::Persistence(_) => 2,
            TrackerError::InvalidConfig(_) | TrackerError::AlreadyStarted(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Couldn't create output directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The existing daily log can't be parsed and couldn't be moved out of the way either.
    #[error("Existing daily log {path:?} is malformed ({source}) and was left untouched")]
    MalformedExistingFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
