//! Periodic check for a newer release, mailed once per version

use crate::notify::{Mail, Notifier};
use crate::services::{ReleaseSource, CURRENT_VERSION};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const CHECK_INTERVAL: Duration = Duration::from_secs(6 * 3600);

pub struct UpdateScheduler {
    source: Arc<dyn ReleaseSource>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    /// Tag of the last release we mailed about
    announced: Mutex<Option<String>>,
}

impl UpdateScheduler {
    pub fn new(source: Arc<dyn ReleaseSource>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            source,
            notifier,
            interval: CHECK_INTERVAL,
            announced: Mutex::new(None),
        }
    }

    /// Look once; true when a mail went out
    pub async fn check_once(&self) -> bool {
        let release = match self.source.newer_release().await {
            Ok(Some(release)) => release,
            Ok(None) => return false,
            Err(e) => {
                warn!("Update check failed: {}", e);
                return false;
            }
        };

        if self.announced.lock().as_deref() == Some(release.tag_name.as_str()) {
            return false;
        }

        let mail = Mail::new_version(CURRENT_VERSION, &release.tag_name, &release.html_url);
        match self.notifier.send(&mail).await {
            Ok(()) => {
                info!("Announced new version {}", release.tag_name);
                *self.announced.lock() = Some(release.tag_name);
                true
            }
            Err(e) => {
                warn!("Failed to send update mail: {}", e);
                false
            }
        }
    }

    /// Check once per interval, the first one after a full interval
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            loop {
                ticker.tick().await;
                self.check_once().await;
            }
        })
    }
}
