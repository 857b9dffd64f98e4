//! Application error types

use thiserror::Error;

/// Which persisted marker tripped the cooldown check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownMarker {
    /// The last successful run timestamp
    LastRun,
    /// The timestamp written next to the last error message
    LastError,
}

impl std::fmt::Display for CooldownMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CooldownMarker::LastRun => write!(f, "last run"),
            CooldownMarker::LastError => write!(f, "last error"),
        }
    }
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Upstream unavailable: {0}")]
    UpstreamDown(String),

    #[error("{marker} has been less than 3 minutes ago, please wait {remaining_secs:.2} second(s)")]
    TooSoon {
        marker: CooldownMarker,
        remaining_secs: f64,
    },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited by market, wait at least 1 minute or change IP")]
    RateLimited,

    #[error("Unexpected market response: {status} ({context})")]
    UnexpectedStatus { status: u16, context: String },

    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Spreadsheet error: {0}")]
    Sheet(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notify(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code, used in logs and mails
    pub fn code(&self) -> &'static str {
        match self {
            AppError::UpstreamDown(_) => "UPSTREAM_DOWN",
            AppError::TooSoon { .. } => "TOO_SOON",
            AppError::Http(_) => "HTTP_ERROR",
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            AppError::InconsistentState(_) => "INCONSISTENT_STATE",
            AppError::Parse(_) => "PARSE_ERROR",
            AppError::Sheet(_) => "SHEET_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Notify(_) => "NOTIFY_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Cooldown violations must never cause an error-cell write
    pub fn is_too_soon(&self) -> bool {
        matches!(self, AppError::TooSoon { .. })
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::Notify(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        AppError::Notify(err.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        AppError::Config(format!("Invalid e-mail address: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_soon_message_carries_wait() {
        let err = AppError::TooSoon {
            marker: CooldownMarker::LastRun,
            remaining_secs: 59.5,
        };
        assert!(err.is_too_soon());
        assert_eq!(err.code(), "TOO_SOON");
        assert_eq!(
            err.to_string(),
            "last run has been less than 3 minutes ago, please wait 59.50 second(s)"
        );
    }

    #[test]
    fn test_other_errors_are_not_too_soon() {
        assert!(!AppError::RateLimited.is_too_soon());
        assert!(!AppError::InconsistentState("x".into()).is_too_soon());
        assert_eq!(AppError::Parse("bad".into()).code(), "PARSE_ERROR");
    }
}
