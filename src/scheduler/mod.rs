//! Scheduler module
//!
//! Long running jobs of watchdog mode:
//! - Valuation run every `retry_interval` hours
//! - Retention sweep of the observation store every 12 hours
//! - Release check every 6 hours

mod janitor;
mod update_check;
mod watchdog;

pub use janitor::DatabaseJanitor;
pub use update_check::UpdateScheduler;
pub use watchdog::Watchdog;

use tracing::{info, warn};

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
