//! SQLite database module

pub mod models;
mod migrations;
mod observations;

use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
pub use models::{NewObservation, Observation};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// Days an observation is kept before the janitor removes it
pub const RETENTION_DAYS: i64 = 30;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Create new SQLite database connection
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Observation Methods ==========

    /// Append one observation
    pub fn append(&self, item_name: &str, price: f64, volume: u64, created_at: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn.lock();
        observations::append_observations(
            &mut conn,
            &[NewObservation::new(item_name, price, volume, created_at)],
        )
        .map(|_| ())
    }

    /// Append a whole fetch pass at once
    pub fn append_many(&self, batch: &[NewObservation]) -> Result<usize> {
        let mut conn = self.conn.lock();
        observations::append_observations(&mut conn, batch)
    }

    pub fn query_by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Observation>> {
        let conn = self.conn.lock();
        observations::query_by_date_range(&conn, start, end)
    }

    pub fn query_by_name(&self, item_name: &str) -> Result<Vec<Observation>> {
        let conn = self.conn.lock();
        observations::query_by_name(&conn, item_name)
    }

    pub fn query_by_name_and_date_range(
        &self,
        item_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Observation>> {
        let conn = self.conn.lock();
        observations::query_by_name_and_date_range(&conn, item_name, start, end)
    }

    /// Delete observations created before `threshold`, returns the count
    pub fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        observations::delete_older_than(&conn, threshold)
    }

    /// Apply the retention window relative to `now`
    pub fn clear_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.delete_older_than(now - Duration::days(RETENTION_DAYS))
    }

    pub fn count_observations(&self) -> Result<i64> {
        let conn = self.conn.lock();
        observations::count_observations(&conn)
    }

    pub fn item_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        observations::item_names(&conn)
    }
}
