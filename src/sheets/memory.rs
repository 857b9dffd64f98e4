//! In-process spreadsheet, used by tests and dry runs

use super::{column_index, parse_cell_ref, SheetStore, ValueBlock};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Sparse cell map keyed by (column index, row)
#[derive(Debug, Default)]
pub struct MemorySheet {
    cells: Mutex<HashMap<(u32, u32), String>>,
    writes: Mutex<Vec<String>>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a cell without recording a write
    pub fn put(&self, cell: &str, value: &str) {
        if let Ok((column, row)) = parse_cell_ref(cell) {
            if let Ok(col) = column_index(&column) {
                self.cells.lock().insert((col, row), value.to_string());
            }
        }
    }

    /// Seed a column starting at `first_row`
    pub fn put_column(&self, column: &str, first_row: u32, values: &[&str]) {
        for (offset, value) in values.iter().enumerate() {
            self.put(&format!("{}{}", column, first_row + offset as u32), value);
        }
    }

    /// Read a cell directly, `None` when never set
    pub fn value(&self, cell: &str) -> Option<String> {
        let (column, row) = parse_cell_ref(cell).ok()?;
        let col = column_index(&column).ok()?;
        self.cells.lock().get(&(col, row)).cloned()
    }

    /// Start cells of every write, in order
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    fn bounds(start: &str, end: &str) -> Result<((u32, u32), (u32, u32))> {
        let (start_col, start_row) = parse_cell_ref(start)?;
        let (end_col, end_row) = parse_cell_ref(end)?;
        let from = (column_index(&start_col)?, start_row);
        let to = (column_index(&end_col)?, end_row);
        if to.0 < from.0 || to.1 < from.1 {
            return Err(AppError::Sheet(format!("Inverted range {}:{}", start, end)));
        }
        Ok((from, to))
    }
}

#[async_trait]
impl SheetStore for MemorySheet {
    async fn get_range(&self, start: &str, end: &str) -> Result<ValueBlock> {
        let ((c0, r0), (c1, r1)) = Self::bounds(start, end)?;
        let cells = self.cells.lock();

        let mut block: ValueBlock = (r0..=r1)
            .map(|row| {
                let mut values: Vec<String> = (c0..=c1)
                    .map(|col| cells.get(&(col, row)).cloned().unwrap_or_default())
                    .collect();
                while values.last().is_some_and(|v| v.is_empty()) {
                    values.pop();
                }
                values
            })
            .collect();

        // Trailing empty rows are omitted, like the hosted API does
        while block.last().is_some_and(|row| row.is_empty()) {
            block.pop();
        }

        Ok(block)
    }

    async fn set_cell(&self, cell: &str, value: &str) -> Result<()> {
        let (column, row) = parse_cell_ref(cell)?;
        let col = column_index(&column)?;
        self.cells.lock().insert((col, row), value.to_string());
        self.writes.lock().push(cell.to_string());
        Ok(())
    }

    async fn set_range(&self, start: &str, end: &str, values: &[String]) -> Result<()> {
        let ((c0, r0), (c1, r1)) = Self::bounds(start, end)?;
        if c0 != c1 {
            return Err(AppError::Sheet("Bulk writes must target one column".to_string()));
        }
        let expected = (r1 - r0 + 1) as usize;
        if values.len() != expected {
            return Err(AppError::Sheet(format!(
                "Range {}:{} holds {} rows, got {} values",
                start,
                end,
                expected,
                values.len()
            )));
        }

        let mut cells = self.cells.lock();
        for (offset, value) in values.iter().enumerate() {
            cells.insert((c0, r0 + offset as u32), value.clone());
        }
        self.writes.lock().push(start.to_string());
        Ok(())
    }
}
