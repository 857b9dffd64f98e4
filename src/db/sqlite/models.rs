//! SQLite database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    pub item_name: String,
    pub price: f64,
    pub volume: u64,
    pub created_at: DateTime<Utc>,
}

/// Observation waiting to be appended; the id is assigned on insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub item_name: String,
    pub price: f64,
    pub volume: u64,
    pub created_at: DateTime<Utc>,
}

impl NewObservation {
    pub fn new(item_name: &str, price: f64, volume: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            item_name: item_name.to_string(),
            price,
            volume,
            created_at,
        }
    }
}
