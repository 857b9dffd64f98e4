//! Periodic retention sweep of the observation store

use crate::db::sqlite::{SqliteDb, RETENTION_DAYS};
use crate::error::{AppError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(12 * 3600);

/// Deletes observations older than the retention window
pub struct DatabaseJanitor {
    db: Arc<SqliteDb>,
    interval: Duration,
}

impl DatabaseJanitor {
    pub fn new(db: Arc<SqliteDb>) -> Self {
        Self {
            db,
            interval: SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One sweep, off the async executor
    pub async fn sweep(&self) -> Result<usize> {
        let db = self.db.clone();
        let deleted = tokio::task::spawn_blocking(move || db.clear_expired(Utc::now()))
            .await
            .map_err(|e| AppError::Internal(format!("Janitor task failed: {}", e)))??;

        if deleted > 0 {
            info!("Removed {} observation(s) older than {} days", deleted, RETENTION_DAYS);
        }
        Ok(deleted)
    }

    /// Sweep now and then once per interval
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Database janitor started");
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep().await {
                    error!("Database cleanup failed: {}", e);
                }
            }
        })
    }
}
