use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};

/// Environment variable overriding the default output directory.
pub const OUTPUT_DIR_ENV: &str = "KEYTRAIL_OUTPUT_DIR";

/// Per-user directory of the application. Holds the logs and, unless overridden, the sessions.
pub fn application_dir() -> Result<PathBuf> {
    let mut path = platform_state_dir()?;
    path.push("keytrail");
    Ok(path)
}

/// Resolves where session files go when `--dir` isn't given. The directory itself is created
/// later, by the tracker on start.
pub fn default_output_dir() -> Result<PathBuf> {
    match env::var_os(OUTPUT_DIR_ENV) {
        Some(path) if !path.is_empty() => Ok(resolve_output_dir(Some(path), Path::new(""))),
        _ => Ok(resolve_output_dir(None, &application_dir()?)),
    }
}

/// Rolling log files live here, never inside the output directory.
pub fn log_dir() -> Result<PathBuf> {
    Ok(logs_in(&application_dir()?))
}

fn resolve_output_dir(env_override: Option<OsString>, app_dir: &Path) -> PathBuf {
    match env_override.filter(|v| !v.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => app_dir.join("sessions"),
    }
}

fn logs_in(app_dir: &Path) -> PathBuf {
    app_dir.join("logs")
}

fn platform_state_dir() -> Result<PathBuf> {
    cfg_if::cfg_if! {
        if #[cfg(windows)] {
            env::var("APPDATA")
                .map(PathBuf::from)
                .map_err(|_| anyhow!("APPDATA should be present on Windows"))
        } else if #[cfg(target_os = "macos")] {
            env::var("HOME")
                .map(|home| PathBuf::from(home).join("Library/Application Support"))
                .map_err(|_| anyhow!("Couldn't find HOME"))
        } else {
            env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/state")))
                .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))
        }
    }
}
