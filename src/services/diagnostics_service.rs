//! Diagnostics Service
//!
//! Self checks behind `--analysis`: recent errors, DNS, platform and the
//! presence and validity of the configuration files.

use crate::config::Config;
use crate::logging::read_error_log;
use crate::system::{is_supported_os, SUPPORTED_OS};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::info;

/// Hosts the tracker needs to reach
pub const REQUIRED_HOSTS: [&str; 2] = ["steamcommunity.com", "sheets.googleapis.com"];

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticsReport {
    pub checks: Vec<CheckResult>,
    /// Lines of the error log, newest last
    pub logged_errors: Vec<String>,
}

impl DiagnosticsReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }
}

impl fmt::Display for DiagnosticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.logged_errors.is_empty() {
            writeln!(f, "No errors found in error log")?;
        } else {
            writeln!(f, "Errors found in error log:")?;
            for line in &self.logged_errors {
                writeln!(f, "  {}", line)?;
            }
        }
        for check in &self.checks {
            let mark = if check.passed { "OK  " } else { "FAIL" };
            writeln!(f, "[{}] {}: {}", mark, check.name, check.detail)?;
        }
        Ok(())
    }
}

/// Diagnostics service for business logic
pub struct DiagnosticsService;

impl DiagnosticsService {
    /// Run every check; individual failures end up in the report
    pub async fn run(log_dir: &Path, config_path: &Path, gcloud_path: &Path) -> DiagnosticsReport {
        info!("DiagnosticsService::run - starting analysis");

        let logged_errors = match read_error_log(log_dir) {
            Ok(lines) => lines,
            Err(e) => vec![format!("could not read error log: {}", e)],
        };

        let mut checks = Vec::new();
        for host in REQUIRED_HOSTS {
            checks.push(Self::check_dns(host).await);
        }
        checks.push(Self::check_os(std::env::consts::OS));
        checks.push(Self::check_file_exists("config file", config_path));
        checks.push(Self::check_config(config_path));
        checks.push(Self::check_file_exists("gcloud file", gcloud_path));

        DiagnosticsReport {
            checks,
            logged_errors,
        }
    }

    pub async fn check_dns(host: &str) -> CheckResult {
        let name = format!("dns {}", host);
        match tokio::net::lookup_host((host, 443)).await {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => CheckResult::pass(&name, addr.ip().to_string()),
                None => CheckResult::fail(&name, "no addresses"),
            },
            Err(e) => CheckResult::fail(&name, e.to_string()),
        }
    }

    pub fn check_os(os: &str) -> CheckResult {
        if is_supported_os(os) {
            CheckResult::pass("operating system", os)
        } else {
            CheckResult::fail(
                "operating system",
                format!("{} is not supported, supported: {}", os, SUPPORTED_OS.join(", ")),
            )
        }
    }

    pub fn check_file_exists(name: &str, path: &Path) -> CheckResult {
        if path.is_file() {
            CheckResult::pass(name, path.display().to_string())
        } else {
            CheckResult::fail(name, format!("{} does not exist", path.display()))
        }
    }

    /// Load and validate the config file in one-shot mode
    pub fn check_config(path: &Path) -> CheckResult {
        match Config::load(path).and_then(|config| config.validate(false)) {
            Ok(()) => CheckResult::pass("config valid", "ok"),
            Err(e) => CheckResult::fail("config valid", e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_check_os() {
        assert!(DiagnosticsService::check_os("linux").passed);
        assert!(DiagnosticsService::check_os("windows").passed);
        assert!(!DiagnosticsService::check_os("plan9").passed);
    }

    #[test]
    fn test_check_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("config.json");
        assert!(!DiagnosticsService::check_file_exists("config file", &missing).passed);
        assert!(!DiagnosticsService::check_config(&missing).passed);

        fs::write(&missing, "{ not json").unwrap();
        assert!(DiagnosticsService::check_file_exists("config file", &missing).passed);
        assert!(!DiagnosticsService::check_config(&missing).passed);
    }

    #[test]
    fn test_report_display() {
        let report = DiagnosticsReport {
            checks: vec![
                CheckResult::pass("operating system", "linux"),
                CheckResult::fail("gcloud file", "missing"),
            ],
            logged_errors: vec![],
        };
        assert!(!report.passed());
        let text = report.to_string();
        assert!(text.contains("No errors found"));
        assert!(text.contains("[OK  ] operating system: linux"));
        assert!(text.contains("[FAIL] gcloud file: missing"));
    }

    #[tokio::test]
    async fn test_run_collects_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("error.log"), "boom\n").unwrap();

        let report = DiagnosticsService::run(
            dir.path(),
            &dir.path().join("config.json"),
            &dir.path().join("gcloud.json"),
        )
        .await;

        assert_eq!(report.logged_errors, vec!["boom"]);
        assert!(report.checks.iter().any(|c| c.name == "gcloud file" && !c.passed));
        assert!(!report.passed());
    }
}
