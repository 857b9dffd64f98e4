//! Upstream health check

use super::types::ServerStatusResponse;
use super::StatusSource;
use crate::error::{AppError, Result};
use crate::state::RunSession;
use tracing::{debug, warn};

/// Health of one upstream subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceHealth {
    Normal,
    Delayed,
    Down,
}

impl ServiceHealth {
    pub fn from_status(raw: &str) -> Self {
        match raw.trim() {
            "normal" => ServiceHealth::Normal,
            "delayed" => ServiceHealth::Delayed,
            _ => ServiceHealth::Down,
        }
    }

    pub fn is_usable(self) -> bool {
        !matches!(self, ServiceHealth::Down)
    }
}

/// Both the logon sessions and the community service must be usable
pub fn evaluate(status: &ServerStatusResponse) -> bool {
    let services = &status.result.services;
    let checks = [
        ("SessionsLogon", &services.sessions_logon),
        ("SteamCommunity", &services.steam_community),
    ];

    let mut usable = true;
    for (name, raw) in checks {
        match ServiceHealth::from_status(raw) {
            ServiceHealth::Normal => {}
            ServiceHealth::Delayed => warn!("Steam service {} is delayed", name),
            ServiceHealth::Down => {
                warn!("Steam service {} is down (status: '{}')", name, raw);
                usable = false;
            }
        }
    }
    usable
}

/// Query the health endpoint; `Ok(false)` means the market should not be used
pub async fn check_upstream(source: &dyn StatusSource, session: &RunSession) -> Result<bool> {
    let response = source.server_status().await?;
    session.add_bytes(response.body.len());

    if response.status != 200 {
        return Err(AppError::UnexpectedStatus {
            status: response.status,
            context: "server status".to_string(),
        });
    }

    let status: ServerStatusResponse = serde_json::from_str(&response.body)?;
    let usable = evaluate(&status);
    debug!("Steam server status checked, usable: {}", usable);
    Ok(usable)
}
