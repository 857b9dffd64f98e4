//! Operator notifications

pub mod mailer;

use crate::error::Result;
use crate::money::Money;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub use mailer::SmtpNotifier;

const APP_NAME: &str = "steamquery";

/// One outgoing message
#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    pub subject: String,
    pub html_body: String,
}

impl Mail {
    fn new(subject: &str, lines: &[String]) -> Self {
        Self {
            subject: format!("{} {}", APP_NAME, subject),
            html_body: lines.join("<br>"),
        }
    }

    pub fn run_failed(error: &str, at: DateTime<Utc>, tz: Tz) -> Self {
        Self::new(
            "run failed",
            &[
                format!("Your last {} run failed.", APP_NAME),
                format!("Error: {}", error),
                format!("Timestamp: {}", at.with_timezone(&tz)),
            ],
        )
    }

    pub fn price_drop(delta: f64, at: DateTime<Utc>, tz: Tz) -> Self {
        Self::new(
            "price drop alert",
            &[
                format!("Since your last {} run prices dropped a lot.", APP_NAME),
                format!("Drop value: {}", Money::new(delta)),
                format!("Timestamp: {}", at.with_timezone(&tz)),
            ],
        )
    }

    pub fn run_summary(delta: f64, at: DateTime<Utc>, tz: Tz) -> Self {
        Self::new(
            "run summary",
            &[
                format!("Your last {} run summary:", APP_NAME),
                format!("Price difference: {}", Money::new(delta)),
                format!("Timestamp: {}", at.with_timezone(&tz)),
            ],
        )
    }

    pub fn new_version(current: &str, latest: &str, url: &str) -> Self {
        Self::new(
            "update available",
            &[
                format!("A new version of {} is available.", APP_NAME),
                format!("Installed: {}, latest: {}", current, latest),
                format!("Download: <a href=\"{}\">{}</a>", url, url),
            ],
        )
    }

    /// Alert when the drop exceeds the tolerated maximum, summary otherwise
    pub fn after_run(delta: f64, max_price_drop: f64, at: DateTime<Utc>, tz: Tz) -> Self {
        if delta < -max_price_drop {
            Self::price_drop(delta, at, tz)
        } else {
            Self::run_summary(delta, at, tz)
        }
    }
}

/// Delivery channel for operator mails
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Keeps every mail instead of sending it
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<Mail>>,
    }

    impl RecordingNotifier {
        pub fn subjects(&self) -> Vec<String> {
            self.sent.lock().iter().map(|m| m.subject.clone()).collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, mail: &Mail) -> Result<()> {
            self.sent.lock().push(mail.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_after_run_picks_alert_or_summary() {
        let drop = Mail::after_run(-60.0, 50.0, at(), Berlin);
        assert_eq!(drop.subject, "steamquery price drop alert");
        assert!(drop.html_body.contains("-60,00€"));

        let small = Mail::after_run(-50.0, 50.0, at(), Berlin);
        assert_eq!(small.subject, "steamquery run summary");

        let gain = Mail::after_run(12.5, 50.0, at(), Berlin);
        assert!(gain.html_body.contains("12,50€"));
    }

    #[test]
    fn test_run_failed_body() {
        let mail = Mail::run_failed("Rate limited", at(), Berlin);
        assert_eq!(mail.subject, "steamquery run failed");
        assert!(mail.html_body.contains("Error: Rate limited<br>"));
        assert!(mail.html_body.contains("2024-07-01 14:00:00 CEST"));
    }
}
