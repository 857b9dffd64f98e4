//! steamquery - Steam market price tracker
//!
//! Reads an item inventory from a Google Sheet, looks up current Steam
//! market prices, writes prices and totals back and keeps a local price
//! history. Runs once or as a watchdog that repeats on an interval.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod market;
pub mod money;
pub mod notify;
pub mod run;
pub mod scheduler;
pub mod services;
pub mod sheets;
pub mod state;
pub mod system;
pub mod valuation;

use anyhow::{bail, Context};
use clap::Parser;
use cli::Cli;
use config::Config;
use db::sqlite::SqliteDb;
use market::{fetcher::check_daily_request_budget, SteamClient};
use notify::{Notifier, SmtpNotifier};
use run::{RunOrchestrator, UpstreamRetry};
use scheduler::{shutdown_signal, DatabaseJanitor, UpdateScheduler, Watchdog};
use services::{DiagnosticsService, ReleaseService, StatsRange, StatsService};
use sheets::{GoogleSheetsStore, SheetStore};
use state::RunSession;
use std::process::ExitCode;
use std::sync::Arc;
use system::{format_bytes, InstanceLock};
use tracing::{error, info, warn};

/// Parse arguments and run the selected mode
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_cli(cli)) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_cli(cli: Cli) -> anyhow::Result<ExitCode> {
    if cli.analysis {
        let report = DiagnosticsService::run(&cli.log_dir, &cli.config, &cli.gcloud).await;
        print!("{}", report);
        return Ok(if report.passed() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    logging::init_logging(&cli.log_dir, cli.debug).context("Failed to set up logging")?;
    info!("Starting steamquery {}", services::CURRENT_VERSION);

    let config = if cli.env {
        Config::from_env(cli.env_file.as_deref())
    } else {
        Config::load(&cli.config)
    }
    .context("Failed to load config")?;

    if cli.stats {
        return print_stats(&cli, &config);
    }

    let _lock = match InstanceLock::acquire(&InstanceLock::default_path())? {
        Some(lock) => lock,
        None => {
            warn!("Another instance is already running, exiting");
            return Ok(ExitCode::SUCCESS);
        }
    };

    if !cli.disable_updates {
        announce_update().await;
    }

    config.validate(cli.watchdog).context("Invalid config")?;
    let tz = config.tz()?;

    let sheet: Arc<dyn SheetStore> = Arc::new(
        GoogleSheetsStore::from_credentials_file(&config.spread_sheet_id, &cli.gcloud)
            .context("Failed to set up Google Sheets access")?,
    );
    sheet
        .test_connection()
        .await
        .context("Could not reach the spreadsheet")?;
    info!("Spreadsheet connection ok");

    let db = Arc::new(
        SqliteDb::new(&config.watch_dog.database_path).context("Failed to open price history")?,
    );
    let steam = Arc::new(SteamClient::new(&config.steam_api_key)?);
    let session = Arc::new(RunSession::new());

    let orchestrator = RunOrchestrator::new(
        sheet.clone(),
        steam.clone(),
        steam,
        Some(db.clone()),
        session.clone(),
        config.layout()?,
        tz,
        cli.skip_checks,
    );

    if cli.watchdog {
        let rows = config.rows()?;
        let (start, end) = rows.cells(&config.item_list.column_letter);
        let block = sheet.get_range(&start, &end).await?;
        let items = ledger::item_names(&ledger::resolve_item_ledger(&block, rows)).len();
        check_daily_request_budget(items, config.watch_dog.retry_interval)?;

        let notifier: Arc<dyn Notifier> = Arc::new(SmtpNotifier::from_config(&config.watch_dog)?);
        let janitor = DatabaseJanitor::new(db).start();
        let updates = if cli.disable_updates {
            None
        } else {
            Some(UpdateScheduler::new(Arc::new(ReleaseService::new()?), notifier.clone()).start())
        };

        let orchestrator = orchestrator.with_upstream_retry(UpstreamRetry::Wait(config.steam_retry()));
        let watchdog = Watchdog::new(
            Arc::new(orchestrator),
            notifier,
            tz,
            config.watch_dog.max_price_drop,
            config.run_interval(),
        );
        let outcome = watchdog.run_until(shutdown_signal()).await;

        janitor.abort();
        if let Some(updates) = updates {
            updates.abort();
        }
        info!("Bytes used: {}", format_bytes(session.total_bytes()));
        outcome?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Err(e) = DatabaseJanitor::new(db).sweep().await {
        warn!("Database cleanup failed: {}", e);
    }

    let outcome = orchestrator.run().await;
    match &outcome {
        Ok(_) => orchestrator.record_success().await?,
        Err(e) => {
            if let Err(write_err) = orchestrator.record_failure(e).await {
                error!("Failed to write error cell: {}", write_err);
            }
        }
    }
    println!("Bytes used: {}", format_bytes(session.total_bytes()));

    if let Err(e) = outcome {
        bail!("Run failed: {}", e);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_stats(cli: &Cli, config: &Config) -> anyhow::Result<ExitCode> {
    let range = StatsRange::parse(&cli.stats_range)?;
    let db = SqliteDb::new(&config.watch_dog.database_path).context("Failed to open price history")?;
    let stats = StatsService::analyse(&db, &cli.stats_items, &range, chrono::Utc::now())?;
    print!("{}", StatsService::render(&stats));
    Ok(ExitCode::SUCCESS)
}

/// Startup release check; failures only warn
async fn announce_update() {
    let release = match ReleaseService::new() {
        Ok(service) => service.check().await,
        Err(e) => Err(e),
    };

    match release {
        Ok(Some(release)) => {
            println!(
                "New version {} available (running {}): {}",
                release.tag_name,
                services::CURRENT_VERSION,
                release.html_url
            );
            if !release.body.trim().is_empty() {
                println!("Changelog:\n{}", release.body.trim());
            }
        }
        Ok(None) => {}
        Err(e) => warn!("Could not check for updates: {}", e),
    }
}
