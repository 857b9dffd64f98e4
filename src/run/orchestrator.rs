//! Run orchestrator
//!
//! Sequences one valuation run. Later steps read back what earlier steps
//! wrote, so the sheet stays the source of truth for prices and totals.

use super::guard::{format_timestamp, MarkerCells, RunGuard, NO_ERROR_SENTINEL};
use super::RunState;
use crate::db::sqlite::{NewObservation, SqliteDb};
use crate::error::{AppError, Result};
use crate::ledger::{self, RowSpan};
use crate::market::{check_upstream, MarketTransport, PriceFetcher, PriceQuote, StatusSource};
use crate::money::Money;
use crate::sheets::{SheetStore, ValueBlock};
use crate::state::RunSession;
use crate::system::format_bytes;
use crate::valuation;
use chrono::Utc;
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What to do when the market reports itself down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamRetry {
    FailFast,
    Wait(Duration),
}

/// Where everything lives on the sheet
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub item_column: String,
    pub rows: RowSpan,
    pub price_column: String,
    pub price_total_column: String,
    pub amount_column: String,
    pub markers: MarkerCells,
    pub total_value_cell: String,
    pub difference_cell: String,
}

/// Runs the valuation pipeline against one sheet
pub struct RunOrchestrator {
    sheet: Arc<dyn SheetStore>,
    status: Arc<dyn StatusSource>,
    fetcher: PriceFetcher,
    guard: RunGuard,
    repository: Option<Arc<SqliteDb>>,
    session: Arc<RunSession>,
    layout: RunLayout,
    tz: Tz,
    upstream_retry: UpstreamRetry,
}

impl RunOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sheet: Arc<dyn SheetStore>,
        market: Arc<dyn MarketTransport>,
        status: Arc<dyn StatusSource>,
        repository: Option<Arc<SqliteDb>>,
        session: Arc<RunSession>,
        layout: RunLayout,
        tz: Tz,
        skip_checks: bool,
    ) -> Self {
        let guard = RunGuard::new(sheet.clone(), layout.markers.clone(), tz, skip_checks);
        let fetcher = PriceFetcher::new(market, session.clone());

        Self {
            sheet,
            status,
            fetcher,
            guard,
            repository,
            session,
            layout,
            tz,
            upstream_retry: UpstreamRetry::FailFast,
        }
    }

    pub fn with_upstream_retry(mut self, retry: UpstreamRetry) -> Self {
        self.upstream_retry = retry;
        self
    }

    pub fn with_fetcher(mut self, fetcher: PriceFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn session(&self) -> &Arc<RunSession> {
        &self.session
    }

    /// Advisory busy flag for schedulers
    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    /// Execute one run and return the delta against the previous total
    pub async fn run(&self) -> Result<f64> {
        let _busy = self
            .session
            .try_begin()
            .ok_or_else(|| AppError::Internal("A run is already executing".to_string()))?;

        let started = Instant::now();
        let result = self.execute().await;

        match &result {
            Ok(delta) => {
                self.enter(RunState::Done);
                self.session.set_last_delta(*delta);
                info!(
                    "Run finished in {:.2}s, difference {}, {} transferred",
                    started.elapsed().as_secs_f64(),
                    Money::new(*delta),
                    format_bytes(self.session.take_bytes())
                );
            }
            Err(e) => {
                self.enter(RunState::Errored);
                error!("Run failed [{}]: {}", e.code(), e);
            }
        }

        result
    }

    async fn execute(&self) -> Result<f64> {
        self.enter(RunState::CheckingUpstream);
        self.wait_for_upstream().await?;

        self.enter(RunState::CheckingFreshness);
        self.guard.check_freshness().await?;

        self.enter(RunState::ResolvingLedger);
        let rows = self.layout.rows;
        let items = ledger::resolve_item_ledger(&self.read_column(&self.layout.item_column).await?, rows);
        let amounts = ledger::resolve_amounts(&self.read_column(&self.layout.amount_column).await?, rows)?;
        let names = ledger::item_names(&items);
        info!("Resolved {} row(s), {} distinct item(s)", items.len(), names.len());

        self.enter(RunState::Fetching);
        let report = self.fetcher.fetch_prices(&names).await?;
        let observations = self.spawn_observations(&report.quotes);

        self.enter(RunState::Writing);
        let prices = ledger::price_column(&items, &report.quotes)?;
        self.write_column(&self.layout.price_column, &prices).await?;
        info!("Wrote {} price(s)", report.quotes.len());

        self.enter(RunState::ComputingTotals);
        let written_prices = self.read_back(&self.layout.price_column).await?;
        let totals = valuation::compute_item_totals(&amounts, &written_prices)?;

        self.enter(RunState::WritingTotals);
        self.write_column(&self.layout.price_total_column, &totals).await?;
        let previous_total = self.read_total().await?;
        let overall = valuation::compute_overall_total(&totals)?;
        self.sheet.set_cell(&self.layout.total_value_cell, &overall).await?;
        debug!("Overall value {} (previous {})", overall, previous_total);

        self.enter(RunState::ComputingDelta);
        let new_total = self.read_total().await?;
        let delta = valuation::compute_delta(&previous_total, &new_total)?;
        self.sheet
            .set_cell(&self.layout.difference_cell, &Money::new(delta).to_string())
            .await?;

        self.enter(RunState::WritingTimestamp);
        let stamp = format_timestamp(Utc::now(), self.tz);
        self.sheet.set_cell(&self.layout.markers.last_updated, &stamp).await?;

        if let Some(handle) = observations {
            match handle.await {
                Ok(Ok(count)) => debug!("Stored {} observation(s)", count),
                Ok(Err(e)) => error!("Failed to store observations: {}", e),
                Err(e) => error!("Observation task failed: {}", e),
            }
        }

        Ok(delta)
    }

    async fn wait_for_upstream(&self) -> Result<()> {
        loop {
            if check_upstream(self.status.as_ref(), &self.session).await? {
                info!("Steam is up, proceeding");
                return Ok(());
            }

            match self.upstream_retry {
                UpstreamRetry::FailFast => {
                    return Err(AppError::UpstreamDown("Steam is down, retry later".to_string()))
                }
                UpstreamRetry::Wait(interval) => {
                    info!("Steam is down, checking again in {} minute(s)", interval.as_secs() / 60);
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    fn enter(&self, state: RunState) {
        debug!("Run state: {} -> {}", self.session.state(), state);
        self.session.set_state(state);
    }

    async fn read_column(&self, column: &str) -> Result<ValueBlock> {
        let (start, end) = self.layout.rows.cells(column);
        self.sheet.get_range(&start, &end).await
    }

    /// Column contents keyed by row, missing trailing rows read as empty
    async fn read_back(&self, column: &str) -> Result<BTreeMap<u32, String>> {
        let block = self.read_column(column).await?;
        Ok(self
            .layout
            .rows
            .rows()
            .enumerate()
            .map(|(offset, row)| {
                let value = block
                    .get(offset)
                    .and_then(|cells| cells.first())
                    .cloned()
                    .unwrap_or_default();
                (row, value)
            })
            .collect())
    }

    async fn write_column(&self, column: &str, by_row: &BTreeMap<u32, String>) -> Result<()> {
        let (start, end) = self.layout.rows.cells(column);
        let values = ledger::column_values(self.layout.rows, by_row);
        self.sheet.set_range(&start, &end, &values).await
    }

    /// Overall value cell, an empty cell counts as zero
    async fn read_total(&self) -> Result<String> {
        let value = self.sheet.get_cell(&self.layout.total_value_cell).await?;
        if value.trim().is_empty() {
            Ok(Money::ZERO.to_string())
        } else {
            Ok(value)
        }
    }

    fn spawn_observations(
        &self,
        quotes: &BTreeMap<String, PriceQuote>,
    ) -> Option<JoinHandle<Result<usize>>> {
        let repository = self.repository.clone()?;
        let now = Utc::now();
        let batch: Vec<NewObservation> = quotes
            .iter()
            .map(|(name, quote)| NewObservation::new(name, quote.lowest_price.as_f64(), quote.volume, now))
            .collect();

        Some(tokio::task::spawn_blocking(move || repository.append_many(&batch)))
    }

    /// Write the error marker for a failed run.
    ///
    /// Cooldown violations are never recorded: the write would reset the
    /// very timestamp the guard just rejected.
    pub async fn record_failure(&self, err: &AppError) -> Result<()> {
        if err.is_too_soon() {
            warn!("Not recording cooldown violation in the error cell");
            return Ok(());
        }

        info!("Writing error cell, please wait");
        let cells = &self.layout.markers;
        self.sheet.set_cell(&cells.error, &err.to_string()).await?;
        self.sheet
            .set_cell(&cells.error_time, &format_timestamp(Utc::now(), self.tz))
            .await?;
        Ok(())
    }

    /// Reset the error marker after a successful run
    pub async fn record_success(&self) -> Result<()> {
        let cells = &self.layout.markers;
        self.sheet.set_cell(&cells.error, NO_ERROR_SENTINEL).await?;
        self.sheet.set_cell(&cells.error_time, "").await?;
        Ok(())
    }
}
