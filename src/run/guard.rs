//! Run guard: cooldown between runs and after failures
//!
//! The sheet is the only state shared between invocations, so both markers
//! are read back from it on every run instead of being remembered in memory.

use crate::error::{AppError, CooldownMarker, Result};
use crate::sheets::SheetStore;
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Error cell text meaning the previous run succeeded
pub const NO_ERROR_SENTINEL: &str = "No error occured.";

/// Minimum time between a marker and the next run
pub const COOLDOWN: Duration = Duration::from_secs(180);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cells holding the run and error markers
#[derive(Debug, Clone)]
pub struct MarkerCells {
    pub last_updated: String,
    pub error: String,
    pub error_time: String,
}

/// Marker timestamp as written to the sheet, e.g. `2024-07-01 14:00:00 CEST`
pub fn format_timestamp(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz)
        .format(&format!("{} %Z", TIMESTAMP_FORMAT))
        .to_string()
}

/// Parse a marker timestamp as local time in `tz`.
///
/// The trailing zone abbreviation picks the instant inside the repeated hour
/// of a DST fall-back. Without one the later instant is used, which never
/// shortens the cooldown.
pub fn parse_timestamp(raw: &str, tz: Tz) -> Result<DateTime<Tz>> {
    let trimmed = raw.trim();
    let (local, zone) = match trimmed.rsplit_once(' ') {
        Some((head, zone)) if zone.chars().all(|c| c.is_ascii_alphabetic()) => (head, Some(zone)),
        _ => (trimmed, None),
    };

    let naive = NaiveDateTime::parse_from_str(local, TIMESTAMP_FORMAT)
        .map_err(|e| AppError::Parse(format!("Invalid timestamp '{}': {}", raw, e)))?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(parsed) => Ok(parsed),
        LocalResult::Ambiguous(earlier, later) => {
            let earlier_zone = earlier.format("%Z").to_string();
            if zone.is_some_and(|z| z.eq_ignore_ascii_case(&earlier_zone)) {
                Ok(earlier)
            } else {
                Ok(later)
            }
        }
        LocalResult::None => Err(AppError::Parse(format!(
            "Timestamp '{}' does not exist in {}",
            raw, tz
        ))),
    }
}

/// Reads the markers and refuses runs inside the cooldown
pub struct RunGuard {
    store: Arc<dyn SheetStore>,
    cells: MarkerCells,
    tz: Tz,
    skip_checks: bool,
}

impl RunGuard {
    pub fn new(store: Arc<dyn SheetStore>, cells: MarkerCells, tz: Tz, skip_checks: bool) -> Self {
        if skip_checks {
            warn!("Skip checks flag specified, ignoring last updated and error cells");
        }
        Self {
            store,
            cells,
            tz,
            skip_checks,
        }
    }

    pub async fn check_freshness(&self) -> Result<()> {
        self.check_freshness_at(Utc::now()).await
    }

    pub async fn check_freshness_at(&self, now: DateTime<Utc>) -> Result<()> {
        if self.skip_checks {
            return Ok(());
        }

        let last_updated = self.store.get_cell(&self.cells.last_updated).await?;
        if !last_updated.trim().is_empty() {
            let ts = parse_timestamp(&last_updated, self.tz)?;
            debug!("Last updated: {}", ts);
            self.check_marker(CooldownMarker::LastRun, ts, now)?;
        }

        let message = self.store.get_cell(&self.cells.error).await?;
        let message = message.trim();
        if message.is_empty() || message == NO_ERROR_SENTINEL {
            info!("No error on last run, proceeding");
            return Ok(());
        }

        let error_time = self.store.get_cell(&self.cells.error_time).await?;
        if error_time.trim().is_empty() {
            warn!(
                "Error cell holds '{}' but {} is empty, skipping error cooldown",
                message, self.cells.error_time
            );
            return Ok(());
        }

        let ts = parse_timestamp(&error_time, self.tz)?;
        debug!("Last error: {}", ts);
        self.check_marker(CooldownMarker::LastError, ts, now)
    }

    fn check_marker(&self, marker: CooldownMarker, ts: DateTime<Tz>, now: DateTime<Utc>) -> Result<()> {
        let elapsed = now.signed_duration_since(ts.with_timezone(&Utc));
        let cooldown = COOLDOWN.as_secs_f64();
        let elapsed_secs = elapsed.num_milliseconds() as f64 / 1000.0;

        if elapsed_secs < cooldown {
            let remaining_secs = cooldown - elapsed_secs;
            debug!("{} was {:.2}s ago, {:.2}s left", marker, elapsed_secs, remaining_secs);
            return Err(AppError::TooSoon {
                marker,
                remaining_secs,
            });
        }
        Ok(())
    }
}
