//! Services Layer
//!
//! Business logic behind the auxiliary CLI modes and the periodic jobs.
//! The price tracking pass itself lives in `run`.
//!
//! # Architecture
//!
//! ```text
//! CLI flags ─────────┐
//!                    ├──> Services --> SQLite / GitHub / host
//! Scheduler jobs ────┘
//! ```
//!
//! # Services
//!
//! - `StatsService` - Summaries of the stored price history
//! - `DiagnosticsService` - Self checks for `--analysis`
//! - `ReleaseService` - Latest release lookup and version comparison

pub mod diagnostics_service;
pub mod release_service;
pub mod stats_service;

// Re-export commonly used types and services
pub use diagnostics_service::{CheckResult, DiagnosticsReport, DiagnosticsService};
pub use release_service::{is_newer, ReleaseInfo, ReleaseService, ReleaseSource, CURRENT_VERSION};
pub use stats_service::{ItemStats, StatsRange, StatsService};
