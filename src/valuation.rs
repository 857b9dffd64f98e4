//! Valuation engine
//!
//! Per-row subtotals, the overall total and the change against the previous
//! run. Inputs are the currency strings read back from the sheet, so every
//! value goes through [`Money::parse`].

use crate::error::{AppError, Result};
use crate::money::Money;
use std::collections::BTreeMap;
use tracing::debug;

/// `amount × price` for every row; rows holding nothing get an empty cell.
///
/// A held row without a price means the price column and the ledger came
/// from different runs, which is never patched over.
pub fn compute_item_totals(
    amounts: &BTreeMap<u32, u64>,
    prices: &BTreeMap<u32, String>,
) -> Result<BTreeMap<u32, String>> {
    let mut totals = BTreeMap::new();

    for (row, amount) in amounts {
        if *amount == 0 {
            totals.insert(*row, String::new());
            continue;
        }

        let price = prices
            .get(row)
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                AppError::InconsistentState(format!(
                    "Row {} holds {} item(s) but has no price",
                    row, amount
                ))
            })?;

        let total = Money::parse(price)? * *amount;
        totals.insert(*row, total.to_string());
    }

    debug!("Item totals: {:?}", totals);
    Ok(totals)
}

/// Sum of all non-empty row totals
pub fn compute_overall_total(row_totals: &BTreeMap<u32, String>) -> Result<String> {
    let mut total = Money::ZERO;
    for value in row_totals.values().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        total = total + Money::parse(value)?;
    }
    Ok(total.to_string())
}

/// `new - previous`, both given as sheet currency strings
pub fn compute_delta(previous_total: &str, new_total: &str) -> Result<f64> {
    let previous = Money::parse(previous_total)?;
    let new = Money::parse(new_total)?;
    Ok((new - previous).as_f64())
}
