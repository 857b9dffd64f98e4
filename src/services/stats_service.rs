//! Stats Service
//!
//! Summarises the stored price history per item.

use crate::db::sqlite::{Observation, SqliteDb};
use crate::error::{AppError, Result};
use crate::money::Money;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::{info, warn};

/// Which observations to look at
#[derive(Debug, Clone, PartialEq)]
pub enum StatsRange {
    AllTime,
    Last(Duration),
}

impl StatsRange {
    /// `7d`, `12h`, or blank / `all` for everything
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim().to_lowercase();
        if input.is_empty() || input == "all" || input == "all time" {
            return Ok(StatsRange::AllTime);
        }

        let unit = input.chars().last().unwrap_or_default();
        let amount: i64 = input[..input.len() - unit.len_utf8()]
            .trim()
            .parse()
            .map_err(|_| AppError::Parse(format!("Invalid date range '{}'", input)))?;
        if amount <= 0 {
            return Err(AppError::Parse(format!("Invalid date range '{}'", input)));
        }

        match unit {
            'h' => Ok(StatsRange::Last(Duration::hours(amount))),
            'd' => Ok(StatsRange::Last(Duration::days(amount))),
            _ => Err(AppError::Parse(format!(
                "Unsupported range specifier in '{}', supported: h and d",
                input
            ))),
        }
    }
}

/// Price history summary of one item
#[derive(Debug, Clone, Serialize)]
pub struct ItemStats {
    pub item_name: String,
    pub observations: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub first_price: f64,
    pub last_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub average_price: f64,
    pub last_volume: u64,
}

impl ItemStats {
    pub fn change(&self) -> f64 {
        self.last_price - self.first_price
    }

    /// Sorted, non-empty observations of one item
    fn from_sorted(item_name: &str, observations: &[Observation]) -> Option<Self> {
        let first = observations.first()?;
        let last = observations.last()?;
        let prices = observations.iter().map(|o| o.price);

        Some(Self {
            item_name: item_name.to_string(),
            observations: observations.len(),
            first_seen: first.created_at,
            last_seen: last.created_at,
            first_price: first.price,
            last_price: last.price,
            min_price: prices.clone().fold(f64::INFINITY, f64::min),
            max_price: prices.clone().fold(f64::NEG_INFINITY, f64::max),
            average_price: prices.sum::<f64>() / observations.len() as f64,
            last_volume: last.volume,
        })
    }
}

/// Stats service for business logic
pub struct StatsService;

impl StatsService {
    /// Load observations for the given items (empty or `all` means every item)
    pub fn load(
        db: &SqliteDb,
        items: &[String],
        range: &StatsRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<Observation>> {
        let all_items = items.is_empty() || items.iter().any(|i| i.eq_ignore_ascii_case("all"));

        let mut results = match (all_items, range) {
            (true, StatsRange::AllTime) => db.query_by_date_range(DateTime::<Utc>::UNIX_EPOCH, now)?,
            (true, StatsRange::Last(span)) => db.query_by_date_range(now - *span, now)?,
            (false, StatsRange::AllTime) => {
                let mut results = Vec::new();
                for item in items {
                    results.extend(db.query_by_name(item)?);
                }
                results
            }
            (false, StatsRange::Last(span)) => {
                let mut results = Vec::new();
                for item in items {
                    results.extend(db.query_by_name_and_date_range(item, now - *span, now)?);
                }
                results
            }
        };

        results.sort_by_key(|o| o.created_at);
        Ok(results)
    }

    /// Per-item summary of already loaded observations
    pub fn summarize(observations: &[Observation]) -> Vec<ItemStats> {
        let mut by_item: BTreeMap<&str, Vec<Observation>> = BTreeMap::new();
        for observation in observations {
            by_item
                .entry(observation.item_name.as_str())
                .or_default()
                .push(observation.clone());
        }

        by_item
            .into_iter()
            .filter_map(|(name, mut list)| {
                list.sort_by_key(|o| o.created_at);
                ItemStats::from_sorted(name, &list)
            })
            .collect()
    }

    /// Load and summarise, failing when nothing matches
    pub fn analyse(
        db: &SqliteDb,
        items: &[String],
        range: &StatsRange,
        now: DateTime<Utc>,
    ) -> Result<Vec<ItemStats>> {
        info!("StatsService::analyse - {} item filter(s), {:?}", items.len(), range);

        let observations = Self::load(db, items, range, now)?;
        if observations.is_empty() {
            return Err(AppError::Internal("No results found in database".to_string()));
        }

        let stats = Self::summarize(&observations);
        for item in &stats {
            let days = (item.last_seen - item.first_seen).num_days();
            if item.observations < 2 || (days as usize) + 1 > item.observations {
                warn!(
                    "Data for {} has gaps ({} observation(s) over {} day(s)), stats may be inaccurate",
                    item.item_name, item.observations, days
                );
            }
        }
        Ok(stats)
    }

    /// Plain text table of the summary
    pub fn render(stats: &[ItemStats]) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<48} {:>5} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "Item", "Obs", "Last", "Min", "Max", "Average", "Change"
        );
        for item in stats {
            let _ = writeln!(
                out,
                "{:<48} {:>5} {:>12} {:>12} {:>12} {:>12} {:>12}",
                item.item_name,
                item.observations,
                Money::new(item.last_price).to_string(),
                Money::new(item.min_price).to_string(),
                Money::new(item.max_price).to_string(),
                Money::new(item.average_price).to_string(),
                Money::new(item.change()).to_string(),
            );
        }
        out
    }
}
