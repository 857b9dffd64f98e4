//! Rate-limited price fetcher
//!
//! The market allows roughly 20 `priceoverview` requests per minute, so
//! requests are issued one by one and the whole pass pauses for a full
//! window after every 20th request that is followed by another one.

use super::types::PriceOverview;
use super::{MarketTransport, PriceQuote, RawResponse};
use crate::error::{AppError, Result};
use crate::money::Money;
use crate::state::RunSession;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Requests per minute the market tolerates
pub const REQUESTS_PER_WINDOW: usize = 20;
pub const WINDOW: Duration = Duration::from_secs(60);

/// Pacing parameters of a fetch pass
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub requests_per_window: usize,
    pub window: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            requests_per_window: REQUESTS_PER_WINDOW,
            window: WINDOW,
        }
    }
}

impl FetchPolicy {
    /// Number of pauses a pass over `requests` names will take
    pub fn expected_sleeps(&self, requests: usize) -> usize {
        if requests == 0 {
            0
        } else {
            (requests - 1) / self.requests_per_window
        }
    }
}

/// Outcome of a completed fetch pass
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub quotes: BTreeMap<String, PriceQuote>,
    pub requests: usize,
    pub sleeps: usize,
}

impl FetchReport {
    pub fn listed(&self) -> usize {
        self.quotes.values().filter(|q| q.has_listing).count()
    }
}

/// Fetches one quote per item name
pub struct PriceFetcher {
    transport: Arc<dyn MarketTransport>,
    session: Arc<RunSession>,
    policy: FetchPolicy,
}

impl PriceFetcher {
    pub fn new(transport: Arc<dyn MarketTransport>, session: Arc<RunSession>) -> Self {
        Self {
            transport,
            session,
            policy: FetchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch quotes for every name; the first fatal response aborts the pass
    pub async fn fetch_prices(&self, names: &BTreeSet<String>) -> Result<FetchReport> {
        let started = Instant::now();
        let max_sleeps = self.policy.expected_sleeps(names.len());
        let mut report = FetchReport::default();

        info!("Fetching {} item price(s), this might take a moment", names.len());

        for name in names {
            if report.requests > 0 && report.requests % self.policy.requests_per_window == 0 {
                report.sleeps += 1;
                info!(
                    "Sleeping {}s to stay under the market rate limit ({}/{} sleep(s))",
                    self.policy.window.as_secs(),
                    report.sleeps,
                    max_sleeps
                );
                tokio::time::sleep(self.policy.window).await;
            }

            debug!("Fetching price for {}", name);
            let response = self.transport.price_overview(name).await?;
            report.requests += 1;
            self.session.add_bytes(response.body.len());

            let quote = classify_price_response(name, &response)?;
            debug!(
                "Done fetching price for {} (price: {}, volume: {})",
                name, quote.lowest_price, quote.volume
            );
            report.quotes.insert(name.clone(), quote);
        }

        info!(
            "Fetched {} item price(s), {} listed, took {:.2}s",
            report.quotes.len(),
            report.listed(),
            started.elapsed().as_secs_f64()
        );

        Ok(report)
    }
}

/// Turn one raw market response into a quote or a fatal error
pub fn classify_price_response(name: &str, response: &RawResponse) -> Result<PriceQuote> {
    match response.status {
        200 => {}
        429 => return Err(AppError::RateLimited),
        500 => {
            warn!("Could not find item on market: {}, pricing it at 0,00€", name);
            return Ok(PriceQuote::unlisted());
        }
        status => {
            return Err(AppError::UnexpectedStatus {
                status,
                context: format!("price lookup for {}", name),
            })
        }
    }

    let overview: PriceOverview = serde_json::from_str(&response.body)?;

    if !overview.success {
        warn!("No market listing for item {}", name);
        return Ok(PriceQuote::unlisted());
    }

    let lowest = match overview.lowest_price.as_deref().map(str::trim) {
        Some(price) if !price.is_empty() => Money::parse_listing(price)?,
        _ => {
            warn!("Market returned no lowest price for {}", name);
            return Ok(PriceQuote::unlisted());
        }
    };

    let volume = match overview.volume.as_deref().map(str::trim) {
        Some(volume) if !volume.is_empty() => parse_volume(volume)?,
        _ => 0,
    };

    Ok(PriceQuote::listed(lowest, volume))
}

fn parse_volume(raw: &str) -> Result<u64> {
    let digits: String = raw.chars().filter(|c| *c != ',' && *c != '.').collect();
    digits
        .parse::<u64>()
        .map_err(|_| AppError::Parse(format!("Invalid market volume '{}'", raw)))
}

/// Reject watchdog intervals whose estimated daily request count exceeds
/// what the rate limit allows in a day
pub fn check_daily_request_budget(items: usize, retry_interval_hours: u32) -> Result<()> {
    if retry_interval_hours == 0 {
        return Err(AppError::Config("Retry interval must be at least 1 hour".to_string()));
    }

    let max_per_day = 1440 * REQUESTS_PER_WINDOW;
    let runs_per_day = (24 / retry_interval_hours).max(1) as usize;
    let per_day = items * runs_per_day;

    if per_day > max_per_day {
        return Err(AppError::Config(format!(
            "Potential requests per day ({}) exceed the limit ({}), please increase your retry interval",
            per_day, max_per_day
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Answers from a script, defaulting to a listed 1,00€ quote
    #[derive(Default)]
    struct ScriptedMarket {
        responses: HashMap<String, RawResponse>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedMarket {
        fn with(mut self, name: &str, status: u16, body: &str) -> Self {
            self.responses
                .insert(name.to_string(), RawResponse::new(status, body));
            self
        }
    }

    #[async_trait]
    impl MarketTransport for ScriptedMarket {
        async fn price_overview(&self, market_name: &str) -> Result<RawResponse> {
            self.calls.lock().push(market_name.to_string());
            if market_name == "offline" {
                return Err(AppError::Transport("connection reset".into()));
            }
            Ok(self.responses.get(market_name).cloned().unwrap_or_else(|| {
                RawResponse::new(
                    200,
                    r#"{"success":true,"lowest_price":"1,00€","volume":"3","median_price":"1,01€"}"#,
                )
            }))
        }
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fetcher(market: ScriptedMarket) -> (PriceFetcher, Arc<ScriptedMarket>, Arc<RunSession>) {
        let market = Arc::new(market);
        let session = Arc::new(RunSession::new());
        let fetcher = PriceFetcher::new(market.clone(), session.clone());
        (fetcher, market, session)
    }

    #[test]
    fn test_classify_listed() {
        let body = r#"{"success":true,"lowest_price":"1.234,56€","volume":"1,024","median_price":"1.200,00€"}"#;
        let quote = classify_price_response("Knife", &RawResponse::new(200, body)).unwrap();
        assert!(quote.has_listing);
        assert!((quote.lowest_price.as_f64() - 1234.56).abs() < 1e-9);
        assert_eq!(quote.volume, 1024);
    }

    #[test]
    fn test_classify_dash_placeholders() {
        let body = r#"{"success":true,"lowest_price":"3,--€"}"#;
        let quote = classify_price_response("Case", &RawResponse::new(200, body)).unwrap();
        assert_eq!(quote.lowest_price.to_string(), "3,00€");
        assert_eq!(quote.volume, 0);
    }

    #[test]
    fn test_classify_unlisted_and_not_found() {
        let quote =
            classify_price_response("x", &RawResponse::new(200, r#"{"success":false}"#)).unwrap();
        assert_eq!(quote, PriceQuote::unlisted());

        let quote = classify_price_response("x", &RawResponse::new(500, "")).unwrap();
        assert!(!quote.has_listing);
        assert_eq!(quote.lowest_price.to_string(), "0,00€");
    }

    #[test]
    fn test_classify_fatal_statuses() {
        assert!(matches!(
            classify_price_response("x", &RawResponse::new(429, "")),
            Err(AppError::RateLimited)
        ));
        assert!(matches!(
            classify_price_response("x", &RawResponse::new(403, "")),
            Err(AppError::UnexpectedStatus { status: 403, .. })
        ));
        assert!(matches!(
            classify_price_response("x", &RawResponse::new(200, "<html>")),
            Err(AppError::Serialization(_))
        ));
    }

    #[test]
    fn test_expected_sleeps() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.expected_sleeps(0), 0);
        assert_eq!(policy.expected_sleeps(20), 0);
        assert_eq!(policy.expected_sleeps(21), 1);
        assert_eq!(policy.expected_sleeps(40), 1);
        assert_eq!(policy.expected_sleeps(41), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_41_requests_sleep_twice() {
        let (fetcher, market, session) = fetcher(ScriptedMarket::default());
        let list: BTreeSet<String> = (0..41).map(|i| format!("item-{:02}", i)).collect();

        let started = tokio::time::Instant::now();
        let report = fetcher.fetch_prices(&list).await.unwrap();

        assert_eq!(report.requests, 41);
        assert_eq!(report.sleeps, 2);
        assert_eq!(report.quotes.len(), 41);
        assert_eq!(market.calls.lock().len(), 41);
        assert!(started.elapsed() >= Duration::from_secs(120));
        assert!(session.bytes_used() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlisted_items_do_not_abort() {
        let market = ScriptedMarket::default()
            .with("Gone", 500, "")
            .with("Quiet", 200, r#"{"success":false}"#);
        let (fetcher, _, _) = fetcher(market);

        let report = fetcher
            .fetch_prices(&names(&["AK-47", "Gone", "Quiet"]))
            .await
            .unwrap();
        assert_eq!(report.quotes.len(), 3);
        assert_eq!(report.listed(), 1);
        assert_eq!(report.sleeps, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_aborts_pass() {
        let market = ScriptedMarket::default().with("B", 429, "");
        let (fetcher, market, _) = fetcher(market);

        let err = fetcher.fetch_prices(&names(&["A", "B", "C"])).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited));
        // sorted order: C is never requested
        assert_eq!(*market.calls.lock(), vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_aborts_pass() {
        let (fetcher, _, _) = fetcher(ScriptedMarket::default());
        let err = fetcher.fetch_prices(&names(&["offline"])).await.unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }

    #[test]
    fn test_daily_request_budget() {
        assert!(check_daily_request_budget(100, 1).is_ok());
        assert!(check_daily_request_budget(1201, 1).is_err());
        assert!(check_daily_request_budget(1201, 2).is_ok());
        assert!(check_daily_request_budget(10, 0).is_err());
    }
}
