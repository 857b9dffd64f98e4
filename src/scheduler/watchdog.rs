//! Watchdog mode: an initial run, then one run per interval until shutdown.
//!
//! Each run ends with a marker write on the sheet and a mail. Only a
//! cooldown violation stops the loop.

use crate::error::{AppError, Result};
use crate::notify::{Mail, Notifier};
use crate::run::RunOrchestrator;
use chrono::Utc;
use chrono_tz::Tz;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

pub struct Watchdog {
    orchestrator: Arc<RunOrchestrator>,
    notifier: Arc<dyn Notifier>,
    tz: Tz,
    max_price_drop: f64,
    interval: Duration,
}

impl Watchdog {
    pub fn new(
        orchestrator: Arc<RunOrchestrator>,
        notifier: Arc<dyn Notifier>,
        tz: Tz,
        max_price_drop: f64,
        interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            notifier,
            tz,
            max_price_drop,
            interval,
        }
    }

    /// Run until `shutdown` resolves or a cooldown violation occurs.
    ///
    /// `shutdown` is watched from the start. A request that arrives during a
    /// run lets that run finish and then stops the loop.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.interval.is_zero() {
            return Err(AppError::Config("Watchdog interval must be positive".to_string()));
        }

        tokio::pin!(shutdown);
        let mut stopping = false;

        info!("Watchdog started, running every {} hour(s)", self.interval.as_secs() / 3600);
        self.tick_watching(shutdown.as_mut(), &mut stopping).await?;
        if stopping {
            return Ok(());
        }

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.as_mut() => {
                    info!("Shutdown requested, stopping watchdog");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if self.orchestrator.is_running() {
                        warn!("Previous run still executing, skipping this tick");
                        continue;
                    }
                    self.tick_watching(shutdown.as_mut(), &mut stopping).await?;
                    if stopping {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// `tick` while still listening for `shutdown`
    async fn tick_watching<F>(&self, mut shutdown: Pin<&mut F>, stopping: &mut bool) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let run = self.tick();
        tokio::pin!(run);

        loop {
            tokio::select! {
                outcome = &mut run => return outcome,
                _ = shutdown.as_mut(), if !*stopping => {
                    info!("Shutdown requested, stopping after the current run");
                    *stopping = true;
                }
            }
        }
    }

    /// One run plus bookkeeping; returns an error only for cooldown violations
    pub async fn tick(&self) -> Result<()> {
        match self.orchestrator.run().await {
            Ok(delta) => {
                if let Err(e) = self.orchestrator.record_success().await {
                    error!("Failed to reset error cell: {}", e);
                }
                let mail = Mail::after_run(delta, self.max_price_drop, Utc::now(), self.tz);
                self.send(&mail).await;
                Ok(())
            }
            Err(e) if e.is_too_soon() => Err(e),
            Err(e) => {
                if let Err(write_err) = self.orchestrator.record_failure(&e).await {
                    error!("Failed to write error cell: {}", write_err);
                }
                self.send(&Mail::run_failed(&e.to_string(), Utc::now(), self.tz)).await;
                Ok(())
            }
        }
    }

    async fn send(&self, mail: &Mail) {
        if let Err(e) = self.notifier.send(mail).await {
            error!("Failed to send mail '{}': {}", mail.subject, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::RowSpan;
    use crate::market::{MarketTransport, RawResponse, StatusSource};
    use crate::notify::testing::RecordingNotifier;
    use crate::run::{MarkerCells, RunLayout, NO_ERROR_SENTINEL};
    use crate::sheets::MemorySheet;
    use crate::state::RunSession;
    use async_trait::async_trait;
    use chrono_tz::Europe::Berlin;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Every lookup returns the current scripted price
    struct FixedMarket {
        price: Mutex<String>,
        status: u16,
    }

    impl FixedMarket {
        fn new(price: &str, status: u16) -> Self {
            Self {
                price: Mutex::new(price.to_string()),
                status,
            }
        }
    }

    #[async_trait]
    impl MarketTransport for FixedMarket {
        async fn price_overview(&self, _market_name: &str) -> Result<RawResponse> {
            let price = self.price.lock().clone();
            Ok(RawResponse::new(
                self.status,
                format!(r#"{{"success":true,"lowest_price":"{}","volume":"5"}}"#, price),
            ))
        }
    }

    struct AlwaysUp;

    #[async_trait]
    impl StatusSource for AlwaysUp {
        async fn server_status(&self) -> Result<RawResponse> {
            Ok(RawResponse::new(
                200,
                r#"{"result":{"services":{"SessionsLogon":"normal","SteamCommunity":"normal"}}}"#,
            ))
        }
    }

    fn layout() -> RunLayout {
        RunLayout {
            item_column: "A".to_string(),
            rows: RowSpan::new(2, 3).unwrap(),
            price_column: "C".to_string(),
            price_total_column: "D".to_string(),
            amount_column: "B".to_string(),
            markers: MarkerCells {
                last_updated: "H2".to_string(),
                error: "H3".to_string(),
                error_time: "H4".to_string(),
            },
            total_value_cell: "H5".to_string(),
            difference_cell: "H6".to_string(),
        }
    }

    fn watchdog(
        market: Arc<FixedMarket>,
        skip_checks: bool,
    ) -> (Watchdog, Arc<MemorySheet>, Arc<RecordingNotifier>) {
        let sheet = Arc::new(MemorySheet::new());
        sheet.put_column("A", 2, &["AK-47", "AWP"]);
        sheet.put_column("B", 2, &["1", "1"]);

        let orchestrator = RunOrchestrator::new(
            sheet.clone(),
            market,
            Arc::new(AlwaysUp),
            None,
            Arc::new(RunSession::new()),
            layout(),
            Berlin,
            skip_checks,
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let watchdog = Watchdog::new(
            Arc::new(orchestrator),
            notifier.clone(),
            Berlin,
            5.0,
            Duration::from_secs(3600),
        );
        (watchdog, sheet, notifier)
    }

    #[tokio::test]
    async fn test_success_resets_error_and_mails_summary() {
        let (watchdog, sheet, notifier) = watchdog(Arc::new(FixedMarket::new("10,00€", 200)), false);
        sheet.put("H3", "old failure");

        watchdog.tick().await.unwrap();

        assert_eq!(sheet.value("H3").as_deref(), Some(NO_ERROR_SENTINEL));
        assert_eq!(sheet.value("H4").as_deref(), Some(""));
        assert_eq!(notifier.subjects(), vec!["steamquery run summary"]);
    }

    #[tokio::test]
    async fn test_price_drop_mails_alert() {
        let market = Arc::new(FixedMarket::new("10,00€", 200));
        let (watchdog, sheet, notifier) = watchdog(market, false);
        sheet.put("H5", "100,00€");

        watchdog.tick().await.unwrap();
        assert_eq!(notifier.subjects(), vec!["steamquery price drop alert"]);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_mailed() {
        let (watchdog, sheet, notifier) = watchdog(Arc::new(FixedMarket::new("", 503)), false);

        watchdog.tick().await.unwrap();

        assert!(sheet.value("H3").is_some_and(|v| v != NO_ERROR_SENTINEL && !v.is_empty()));
        assert!(sheet.value("H4").is_some_and(|v| !v.is_empty()));
        assert_eq!(notifier.subjects(), vec!["steamquery run failed"]);
    }

    #[tokio::test]
    async fn test_cooldown_violation_is_fatal() {
        let (watchdog, sheet, notifier) = watchdog(Arc::new(FixedMarket::new("10,00€", 200)), false);

        watchdog.tick().await.unwrap();
        let err = watchdog.tick().await.unwrap_err();

        assert!(err.is_too_soon());
        assert_eq!(sheet.value("H3").as_deref(), Some(NO_ERROR_SENTINEL));
        assert_eq!(notifier.sent.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_each_interval_until_shutdown() {
        let market = Arc::new(FixedMarket::new("10,00€", 200));
        let (watchdog, _sheet, notifier) = watchdog(market, true);

        // initial run plus ticks at 1h and 2h
        let shutdown = tokio::time::sleep(Duration::from_secs(3600 * 2 + 60));
        watchdog.run_until(shutdown).await.unwrap();

        assert_eq!(notifier.sent.lock().len(), 3);
    }

    /// Slow lookups that note whether shutdown was already being watched
    struct SlowMarket {
        inner: FixedMarket,
        armed: Arc<AtomicBool>,
        seen_armed: AtomicBool,
    }

    #[async_trait]
    impl MarketTransport for SlowMarket {
        async fn price_overview(&self, market_name: &str) -> Result<RawResponse> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            if self.armed.load(Ordering::SeqCst) {
                self.seen_armed.store(true, Ordering::SeqCst);
            }
            self.inner.price_overview(market_name).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_first_run_stops_after_it() {
        let armed = Arc::new(AtomicBool::new(false));
        let market = Arc::new(SlowMarket {
            inner: FixedMarket::new("10,00€", 200),
            armed: armed.clone(),
            seen_armed: AtomicBool::new(false),
        });

        let sheet = Arc::new(MemorySheet::new());
        sheet.put_column("A", 2, &["AK-47", "AWP"]);
        sheet.put_column("B", 2, &["1", "1"]);
        let orchestrator = RunOrchestrator::new(
            sheet,
            market.clone(),
            Arc::new(AlwaysUp),
            None,
            Arc::new(RunSession::new()),
            layout(),
            Berlin,
            true,
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let watchdog = Watchdog::new(
            Arc::new(orchestrator),
            notifier.clone(),
            Berlin,
            5.0,
            Duration::from_secs(3600),
        );

        let shutdown = async move {
            armed.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
        };
        let started = Instant::now();
        watchdog.run_until(shutdown).await.unwrap();

        assert!(market.seen_armed.load(Ordering::SeqCst));
        assert_eq!(notifier.sent.lock().len(), 1);
        assert!(started.elapsed() < Duration::from_secs(3600));
    }
}
