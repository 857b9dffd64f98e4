//! Logging setup using tracing-subscriber.
//!
//! Console output plus two files in the log directory: `app.log` with
//! everything that passes the filter and `error.log` with errors only.

use crate::error::{AppError, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const APP_LOG: &str = "app.log";
pub const ERROR_LOG: &str = "error.log";

fn default_directive(debug: bool) -> &'static str {
    if debug {
        "steamquery=debug,steamquery_lib=debug,warn"
    } else {
        "steamquery=info,steamquery_lib=info,warn"
    }
}

fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

pub fn error_log_path(log_dir: &Path) -> PathBuf {
    log_dir.join(ERROR_LOG)
}

/// Initialize the global tracing subscriber
pub fn init_logging(log_dir: &Path, debug: bool) -> Result<()> {
    fs::create_dir_all(log_dir)?;
    let app_log = open_append(&log_dir.join(APP_LOG))?;
    let error_log = open_append(&error_log_path(log_dir))?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(debug).compact())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(app_log)),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(error_log))
                .with_filter(LevelFilter::ERROR),
        )
        .try_init()
        .map_err(|e| AppError::Internal(format!("Failed to initialize logging: {}", e)))
}

/// Lines of `error.log`, empty when the file does not exist yet
pub fn read_error_log(log_dir: &Path) -> Result<Vec<String>> {
    let path = error_log_path(log_dir);
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_error_log() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_error_log(dir.path()).unwrap().is_empty());

        fs::write(error_log_path(dir.path()), "first\n\nsecond\n").unwrap();
        assert_eq!(read_error_log(dir.path()).unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_default_directive() {
        assert!(default_directive(true).contains("steamquery=debug"));
        assert!(default_directive(false).contains("steamquery=info"));
    }
}
