//! Configuration: JSON file, or upper-case environment keys.
//!
//! Secrets (Steam API key, SMTP password) may live in either source. The
//! env mode optionally loads a dotenv file first.

use crate::error::{AppError, Result};
use crate::ledger::RowSpan;
use crate::run::{MarkerCells, RunLayout};
use crate::sheets::validate_column;
use chrono_tz::Tz;
use lettre::Address;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub item_list: ItemList,
    #[serde(default)]
    pub price_column: String,
    #[serde(default)]
    pub price_total_column: String,
    #[serde(default)]
    pub amount_column: String,
    pub org_cells: OrgCells,
    #[serde(default)]
    pub spread_sheet_id: String,
    #[serde(default)]
    pub steam_api_key: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub watch_dog: WatchDog,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemList {
    #[serde(default)]
    pub column_letter: String,
    #[serde(default)]
    pub start_number: u32,
    #[serde(default)]
    pub end_number: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrgCells {
    #[serde(default)]
    pub last_updated_cell: String,
    #[serde(default)]
    pub error_cell: String,
    #[serde(default)]
    pub error_time_cell: String,
    #[serde(default)]
    pub total_value_cell: String,
    #[serde(default)]
    pub difference_cell: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchDog {
    /// Hours between runs
    #[serde(default)]
    pub retry_interval: u32,
    /// Minutes between health checks while the market is down
    #[serde(default)]
    pub steam_retry_interval: u32,
    /// Largest tolerated drop of the overall value, in euros
    #[serde(default)]
    pub max_price_drop: f64,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default)]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_user: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default)]
    pub smtp_from: String,
    #[serde(default)]
    pub smtp_to: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for WatchDog {
    fn default() -> Self {
        Self {
            retry_interval: 0,
            steam_retry_interval: 0,
            max_price_drop: 0.0,
            smtp_host: String::new(),
            smtp_port: 0,
            smtp_user: String::new(),
            smtp_password: String::new(),
            smtp_from: String::new(),
            smtp_to: String::new(),
            database_path: default_database_path(),
        }
    }
}

fn default_timezone() -> String {
    "Europe/Berlin".into()
}
fn default_database_path() -> PathBuf {
    PathBuf::from("files").join("steamquery.db")
}

/// Minimum minutes between health checks in watchdog mode
pub const MIN_STEAM_RETRY_MINUTES: u32 = 5;

fn missing(what: &str) -> AppError {
    AppError::Config(format!("Missing {} in config", what))
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(missing(what));
    }
    Ok(())
}

impl Config {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Could not read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&body)
    }

    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| AppError::Config(format!("Invalid config: {}", e)))
    }

    /// Load from the process environment, after an optional dotenv file
    pub fn from_env(env_file: Option<&Path>) -> Result<Self> {
        if let Some(file) = env_file {
            dotenvy::from_path(file).map_err(|e| {
                AppError::Config(format!("Could not load env file {}: {}", file.display(), e))
            })?;
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; keys are the upper-case names
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).unwrap_or_default();
        let number = |key: &str| -> Result<u32> {
            let raw = text(key);
            raw.trim().parse().map_err(|_| {
                AppError::Config(format!("Conversion error, perhaps missing env key: {}", key))
            })
        };

        let start_number = number("ITEM_START_NUMBER")?;
        let end_number = number("ITEM_END_NUMBER")?;
        let retry_interval = number("RETRY_INTERVAL")?;
        let steam_retry_interval = number("STEAM_RETRY_INTERVAL")?;
        let smtp_port = number("SMTP_PORT")?;
        let max_price_drop = text("MAX_PRICE_DROP").trim().parse::<f64>().map_err(|_| {
            AppError::Config("Conversion error, perhaps missing env key: MAX_PRICE_DROP".to_string())
        })?;

        Ok(Self {
            item_list: ItemList {
                column_letter: text("ITEM_COLUMN_LETTER"),
                start_number,
                end_number,
            },
            price_column: text("PRICE_COLUMN"),
            price_total_column: text("PRICE_TOTAL_COLUMN"),
            amount_column: text("AMOUNT_COLUMN"),
            org_cells: OrgCells {
                last_updated_cell: text("ORG_LAST_UPDATED"),
                error_cell: text("ORG_ERROR_CELL"),
                error_time_cell: text("ORG_ERROR_TIME_CELL"),
                total_value_cell: text("ORG_TOTAL_CELL"),
                difference_cell: text("ORG_DIFF_CELL"),
            },
            spread_sheet_id: text("SPREADSHEET_ID"),
            steam_api_key: text("STEAM_API_KEY"),
            timezone: lookup("TIMEZONE").unwrap_or_else(default_timezone),
            watch_dog: WatchDog {
                retry_interval,
                steam_retry_interval,
                max_price_drop,
                smtp_host: text("SMTP_HOST"),
                smtp_port: u16::try_from(smtp_port)
                    .map_err(|_| AppError::Config(format!("Invalid SMTP port {}", smtp_port)))?,
                smtp_user: text("SMTP_USER"),
                smtp_password: text("SMTP_PASSWORD"),
                smtp_from: text("SMTP_FROM"),
                smtp_to: text("SMTP_TO"),
                database_path: lookup("DATABASE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_database_path),
            },
        })
    }

    /// Check required fields; watchdog mode additionally needs mail settings
    pub fn validate(&self, watchdog: bool) -> Result<()> {
        require(&self.item_list.column_letter, "item list column letter")?;
        if self.item_list.start_number == 0 {
            return Err(missing("item list start number"));
        }
        if self.item_list.end_number == 0 {
            return Err(missing("item list end number"));
        }
        require(&self.price_column, "price column")?;
        require(&self.price_total_column, "price total column")?;
        require(&self.amount_column, "amount column")?;
        require(&self.org_cells.difference_cell, "difference cell")?;
        require(&self.org_cells.total_value_cell, "total value cell")?;
        require(&self.org_cells.error_cell, "error cell")?;
        require(&self.org_cells.error_time_cell, "error time cell")?;
        require(&self.org_cells.last_updated_cell, "last updated cell")?;
        require(&self.spread_sheet_id, "spreadsheet id")?;
        require(&self.steam_api_key, "steam api key")?;

        for column in [
            &self.item_list.column_letter,
            &self.price_column,
            &self.price_total_column,
            &self.amount_column,
        ] {
            validate_column(column)?;
        }
        self.rows()?;
        self.tz()?;

        if watchdog {
            let wd = &self.watch_dog;
            if wd.retry_interval == 0 {
                return Err(missing("retry interval"));
            }
            if wd.steam_retry_interval == 0 {
                return Err(missing("steam retry interval"));
            }
            if wd.steam_retry_interval < MIN_STEAM_RETRY_MINUTES {
                return Err(AppError::Config(format!(
                    "Steam retry interval needs to be at least {} minutes",
                    MIN_STEAM_RETRY_MINUTES
                )));
            }
            require(&wd.smtp_host, "smtp host")?;
            if wd.smtp_port == 0 {
                return Err(missing("smtp port"));
            }
            require(&wd.smtp_user, "smtp user")?;
            require(&wd.smtp_password, "smtp password")?;
            require(&wd.smtp_from, "smtp from")?;
            require(&wd.smtp_to, "smtp to")?;
            wd.smtp_from.parse::<Address>()?;
            wd.smtp_to.parse::<Address>()?;
        }

        Ok(())
    }

    pub fn rows(&self) -> Result<RowSpan> {
        RowSpan::new(self.item_list.start_number, self.item_list.end_number)
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| AppError::Config(format!("Unknown timezone '{}'", self.timezone)))
    }

    /// Sheet layout used by the run pipeline
    pub fn layout(&self) -> Result<RunLayout> {
        Ok(RunLayout {
            item_column: self.item_list.column_letter.clone(),
            rows: self.rows()?,
            price_column: self.price_column.clone(),
            price_total_column: self.price_total_column.clone(),
            amount_column: self.amount_column.clone(),
            markers: MarkerCells {
                last_updated: self.org_cells.last_updated_cell.clone(),
                error: self.org_cells.error_cell.clone(),
                error_time: self.org_cells.error_time_cell.clone(),
            },
            total_value_cell: self.org_cells.total_value_cell.clone(),
            difference_cell: self.org_cells.difference_cell.clone(),
        })
    }

    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.watch_dog.retry_interval) * 3600)
    }

    pub fn steam_retry(&self) -> Duration {
        Duration::from_secs(u64::from(self.watch_dog.steam_retry_interval) * 60)
    }
}
