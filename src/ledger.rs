//! Cell range codec
//!
//! Turns raw column blocks from the sheet into row-keyed item and amount
//! maps, and maps fetched quotes back onto rows for writing.

use crate::error::{AppError, Result};
use crate::market::PriceQuote;
use crate::sheets::{cell_ref, ValueBlock};
use std::collections::{BTreeMap, BTreeSet};

/// Inclusive row range shared by the item, amount, price and total columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub start: u32,
    pub end: u32,
}

impl RowSpan {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start == 0 || end < start {
            return Err(AppError::Config(format!(
                "Invalid item rows {}..={}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn rows(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    /// First and last cell of this span in `column`
    pub fn cells(&self, column: &str) -> (String, String) {
        (cell_ref(column, self.start), cell_ref(column, self.end))
    }
}

/// One row of the item column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    Item(String),
    /// Blank cell, kept so every row stays addressable
    Empty,
}

impl LedgerEntry {
    pub fn name(&self) -> Option<&str> {
        match self {
            LedgerEntry::Item(name) => Some(name),
            LedgerEntry::Empty => None,
        }
    }
}

pub type ItemLedger = BTreeMap<u32, LedgerEntry>;

fn first_cell(block: &ValueBlock, offset: usize) -> &str {
    block
        .get(offset)
        .and_then(|row| row.first())
        .map(|s| s.trim())
        .unwrap_or("")
}

/// Map each row of the item column to a named entry or a placeholder
pub fn resolve_item_ledger(block: &ValueBlock, span: RowSpan) -> ItemLedger {
    span.rows()
        .enumerate()
        .map(|(offset, row)| {
            let value = first_cell(block, offset);
            let entry = if value.is_empty() {
                LedgerEntry::Empty
            } else {
                LedgerEntry::Item(value.to_string())
            };
            (row, entry)
        })
        .collect()
}

/// Map each row of the amount column to a quantity; blank means 0
pub fn resolve_amounts(block: &ValueBlock, span: RowSpan) -> Result<BTreeMap<u32, u64>> {
    span.rows()
        .enumerate()
        .map(|(offset, row)| {
            let value = first_cell(block, offset);
            if value.is_empty() {
                return Ok((row, 0));
            }
            value
                .parse::<u64>()
                .map(|amount| (row, amount))
                .map_err(|_| AppError::Parse(format!("Invalid amount '{}' in row {}", value, row)))
        })
        .collect()
}

/// Distinct item names, placeholders excluded
pub fn item_names(ledger: &ItemLedger) -> BTreeSet<String> {
    ledger
        .values()
        .filter_map(|entry| entry.name().map(str::to_string))
        .collect()
}

/// Price cell text for every row; blank rows stay blank
pub fn price_column(
    ledger: &ItemLedger,
    quotes: &BTreeMap<String, PriceQuote>,
) -> Result<BTreeMap<u32, String>> {
    ledger
        .iter()
        .map(|(row, entry)| match entry {
            LedgerEntry::Empty => Ok((*row, String::new())),
            LedgerEntry::Item(name) => quotes
                .get(name)
                .map(|quote| (*row, quote.lowest_price.to_string()))
                .ok_or_else(|| {
                    AppError::InconsistentState(format!("Missing quote for item {} (row {})", name, row))
                }),
        })
        .collect()
}

/// Column values in row order, ready for a bulk write over `span`
pub fn column_values(span: RowSpan, by_row: &BTreeMap<u32, String>) -> Vec<String> {
    span.rows()
        .map(|row| by_row.get(&row).cloned().unwrap_or_default())
        .collect()
}
