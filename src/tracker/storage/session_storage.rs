use std::{
    collections::HashMap,
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{NaiveDateTime, NaiveDate};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use crate::{
    tracker::error::PersistenceError,
    utils::time::{daily_log_file_name, session_file_name},
};

use super::entities::{DailyLog, Session};

/// Interface for abstracting storage of sessions.
pub trait SessionStorage {
    /// Directory all files are written to.
    fn dir(&self) -> &Path;

    /// Creates the output directory, including missing parents.
    fn ensure_dir(&self) -> impl Future<Output = Result<(), PersistenceError>>;

    /// Writes a snapshot of `session` to its own file. Saving the same session again overwrites
    /// that file.
    fn save_session(
        &mut self,
        session: &Session,
    ) -> impl Future<Output = Result<PathBuf, PersistenceError>>;

    /// Folds a closed session into the log of the date it started on.
    fn merge_into_daily_log(
        &mut self,
        session: &Session,
        now: NaiveDateTime,
    ) -> impl Future<Output = Result<PathBuf, PersistenceError>>;

    /// Forgets the file assigned to a session that won't be saved again.
    fn release_session(&mut self, session: &Session);
}

/// The main realization of [SessionStorage]. Every document is pretty printed JSON, written to
/// a temporary file first and renamed over the target so a crash never leaves half a file.
pub struct JsonSessionStorage {
    dir: PathBuf,
    assigned: HashMap<NaiveDateTime, PathBuf>,
}

impl JsonSessionStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            assigned: HashMap::new(),
        }
    }

    /// Picks the file of a session on its first save. When another session already owns the
    /// derived name (same minute, or an earlier run) a numeric suffix is added.
    async fn path_for(&mut self, session: &Session) -> Result<PathBuf, PersistenceError> {
        if let Some(path) = self.assigned.get(&session.start_time) {
            return Ok(path.clone());
        }

        let name = session_file_name(session.start_time);
        let stem = name.trim_end_matches(".json");
        let mut path = self.dir.join(&name);
        let mut suffix = 2;
        while exists(&path).await? {
            path = self.dir.join(format!("{stem}_{suffix}.json"));
            suffix += 1;
        }

        debug!("Assigned {path:?} to session started at {}", session.start_time);
        self.assigned.insert(session.start_time, path.clone());
        Ok(path)
    }

    async fn load_daily_log(
        &self,
        path: &Path,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<DailyLog, PersistenceError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DailyLog::new(date, now)),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        match serde_json::from_slice::<DailyLog>(&bytes) {
            Ok(log) => Ok(log),
            Err(e) => {
                quarantine(path, e, now).await?;
                Ok(DailyLog::new(date, now))
            }
        }
    }
}

impl SessionStorage for JsonSessionStorage {
    fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_dir(&self) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PersistenceError::CreateDir {
                path: self.dir.clone(),
                source,
            })
    }

    async fn save_session(&mut self, session: &Session) -> Result<PathBuf, PersistenceError> {
        let path = self.path_for(session).await?;
        write_json(&path, session, "session").await?;
        Ok(path)
    }

    async fn merge_into_daily_log(
        &mut self,
        session: &Session,
        now: NaiveDateTime,
    ) -> Result<PathBuf, PersistenceError> {
        let date = session.start_time.date();
        let path = self.dir.join(daily_log_file_name(date));

        let mut log = self.load_daily_log(&path, date, now).await?;
        log.record(session.clone(), now);
        write_json(&path, &log, "daily log").await?;
        Ok(path)
    }

    fn release_session(&mut self, session: &Session) {
        self.assigned.remove(&session.start_time);
    }
}

async fn exists(path: &Path) -> Result<bool, PersistenceError> {
    fs::try_exists(path)
        .await
        .map_err(|source| PersistenceError::Read {
            path: path.to_owned(),
            source,
        })
}

/// Moves an unreadable daily log aside so a fresh one can take its place. Nothing is
/// overwritten: if the move fails the merge is abandoned.
async fn quarantine(
    path: &Path,
    parse_error: serde_json::Error,
    now: NaiveDateTime,
) -> Result<(), PersistenceError> {
    let stem = path
        .file_stem()
        .map(|v| v.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = path.with_file_name(format!("{stem}.corrupt-{}.json", now.format("%Y%m%dT%H%M%S")));

    warn!("Daily log {path:?} is malformed ({parse_error}), moving it to {target:?}");
    match fs::rename(path, &target).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("Couldn't move malformed daily log {path:?}: {e}");
            Err(PersistenceError::MalformedExistingFile {
                path: path.to_owned(),
                source: parse_error,
            })
        }
    }
}

async fn write_json<T: Serialize>(
    path: &Path,
    value: &T,
    what: &'static str,
) -> Result<(), PersistenceError> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|source| PersistenceError::Serialize { what, source })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| PersistenceError::CreateDir {
                path: parent.to_owned(),
                source,
            })?;
    }

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &json)
        .await
        .map_err(|source| PersistenceError::Write {
            path: temp_path.clone(),
            source,
        })?;
    fs::rename(&temp_path, path)
        .await
        .map_err(|source| PersistenceError::Write {
            path: path.to_owned(),
            source,
        })
}
