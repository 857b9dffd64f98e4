//! Price observation time series
//!
//! Timestamps are stored as UTC text in one fixed format, so range filters
//! compare as plain strings. Callers sort results if order matters.

use super::models::{NewObservation, Observation};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, item_name, price, volume, created_at FROM observations";

fn map_row(row: &Row<'_>) -> rusqlite::Result<Observation> {
    Ok(Observation {
        id: row.get(0)?,
        item_name: row.get(1)?,
        price: row.get(2)?,
        volume: row.get::<_, i64>(3)?.max(0) as u64,
        created_at: row.get(4)?,
    })
}

/// Append observations in one transaction
pub fn append_observations(conn: &mut Connection, observations: &[NewObservation]) -> Result<usize> {
    let tx = conn.transaction()?;

    let mut stmt = tx.prepare(
        "INSERT INTO observations (id, item_name, price, volume, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    for observation in observations {
        stmt.execute(params![
            Uuid::new_v4().to_string(),
            observation.item_name,
            observation.price,
            observation.volume as i64,
            observation.created_at,
        ])?;
    }

    drop(stmt);
    tx.commit()?;

    tracing::debug!("Stored {} observation(s)", observations.len());
    Ok(observations.len())
}

pub fn query_by_date_range(
    conn: &Connection,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Observation>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE created_at >= ?1 AND created_at <= ?2",
        SELECT_COLUMNS
    ))?;

    let observations = stmt
        .query_map(params![start, end], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(observations)
}

pub fn query_by_name(conn: &Connection, item_name: &str) -> Result<Vec<Observation>> {
    let mut stmt = conn.prepare(&format!("{} WHERE item_name = ?1", SELECT_COLUMNS))?;

    let observations = stmt
        .query_map(params![item_name], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(observations)
}

pub fn query_by_name_and_date_range(
    conn: &Connection,
    item_name: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Observation>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE item_name = ?1 AND created_at >= ?2 AND created_at <= ?3",
        SELECT_COLUMNS
    ))?;

    let observations = stmt
        .query_map(params![item_name, start, end], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(observations)
}

/// Delete everything created before `threshold`
pub fn delete_older_than(conn: &Connection, threshold: DateTime<Utc>) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM observations WHERE created_at < ?1",
        params![threshold],
    )?;
    Ok(deleted)
}

pub fn count_observations(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
    Ok(count)
}

/// Distinct item names with at least one observation
pub fn item_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT item_name FROM observations ORDER BY item_name")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}
