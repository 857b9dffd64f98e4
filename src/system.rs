//! Host helpers: browser user agent, byte formatting, single instance lock

use crate::error::{AppError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const UA_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";
const UA_MACOS: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";
const UA_LINUX: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Operating systems the tool is built and tested for
pub const SUPPORTED_OS: &[&str] = &["linux", "macos", "windows"];

/// Browser user agent matching the host OS
pub fn user_agent() -> &'static str {
    user_agent_for(std::env::consts::OS)
}

pub fn user_agent_for(os: &str) -> &'static str {
    match os {
        "windows" => UA_WINDOWS,
        "macos" => UA_MACOS,
        _ => UA_LINUX,
    }
}

pub fn is_supported_os(os: &str) -> bool {
    SUPPORTED_OS.contains(&os)
}

/// Human readable byte count (`1.50 KB`)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Advisory lock on a file, held for the lifetime of the process.
///
/// The OS drops the lock when the process exits for any reason, so a file
/// left behind by a killed instance never blocks the next one.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    // released when closed
    _file: File,
}

impl InstanceLock {
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("steamquery.lock")
    }

    /// Take the lock; `Ok(None)` when another instance holds it
    pub fn acquire(path: &Path) -> Result<Option<Self>> {
        let mut file = OpenOptions::new().create(true).write(true).open(path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if is_contended(&e) {
                return Ok(None);
            }
            return Err(AppError::Io(e));
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        debug!("Acquired instance lock {}", path.display());

        Ok(Some(Self {
            path: path.to_path_buf(),
            _file: file,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_per_os() {
        assert!(user_agent_for("windows").contains("Windows NT"));
        assert!(user_agent_for("macos").contains("Macintosh"));
        assert!(user_agent_for("freebsd").contains("Linux"));
        assert!(!user_agent().is_empty());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_instance_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.lock");

        let first = InstanceLock::acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(InstanceLock::acquire(&path).unwrap().is_none());

        drop(first);
        assert!(InstanceLock::acquire(&path).unwrap().is_some());
    }

    #[test]
    fn test_left_over_lock_file_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.lock");
        std::fs::write(&path, "999999999\n").unwrap();

        let lock = InstanceLock::acquire(&path).unwrap();
        assert!(lock.is_some());
        drop(lock);
        let pid = std::fs::read_to_string(&path).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());
    }
}
