//! Spreadsheet store adapters
//!
//! The run pipeline only sees the [`SheetStore`] trait: rectangular reads and
//! single-column writes addressed in A1 notation.

pub mod google;
pub mod memory;

use crate::error::{AppError, Result};
use async_trait::async_trait;

pub use google::{Credentials, GoogleSheetsStore};
pub use memory::MemorySheet;

/// Row-major block of cell values; trailing empty rows and cells may be absent
pub type ValueBlock = Vec<Vec<String>>;

/// Store trait that all spreadsheet backends must implement
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Read the rectangle `start:end`
    async fn get_range(&self, start: &str, end: &str) -> Result<ValueBlock>;

    /// Overwrite a single cell
    async fn set_cell(&self, cell: &str, value: &str) -> Result<()>;

    /// Overwrite consecutive rows of one column, `values[0]` landing on `start`
    async fn set_range(&self, start: &str, end: &str, values: &[String]) -> Result<()>;

    /// Cheap read used at startup to verify credentials and sheet id
    async fn test_connection(&self) -> Result<()> {
        self.get_range("A1", "Z1").await.map(|_| ())
    }

    /// Value of a single cell, empty when unset
    async fn get_cell(&self, cell: &str) -> Result<String> {
        let block = self.get_range(cell, cell).await?;
        Ok(block
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or_default())
    }
}

/// Build an A1 reference such as `C12`
pub fn cell_ref(column: &str, row: u32) -> String {
    format!("{}{}", column, row)
}

/// Check that a column is given as plain letters (`A`, `AB`)
pub fn validate_column(column: &str) -> Result<()> {
    if column.is_empty() || !column.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Config(format!("Invalid column letter: '{}'", column)));
    }
    Ok(())
}

/// Zero-based index of a column (`A` = 0, `AA` = 26)
pub fn column_index(column: &str) -> Result<u32> {
    validate_column(column)?;
    let index = column
        .chars()
        .map(|c| c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)
        .fold(0u32, |acc, digit| acc * 26 + digit);
    Ok(index - 1)
}

/// Split an A1 reference into its column letters and row number
pub fn parse_cell_ref(cell: &str) -> Result<(String, u32)> {
    let split = cell
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| AppError::Config(format!("Cell reference without row: '{}'", cell)))?;
    let (column, row) = cell.split_at(split);
    validate_column(column)?;
    let row = row
        .parse::<u32>()
        .map_err(|_| AppError::Config(format!("Invalid cell reference: '{}'", cell)))?;
    if row == 0 {
        return Err(AppError::Config(format!("Rows start at 1: '{}'", cell)));
    }
    Ok((column.to_ascii_uppercase(), row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A").unwrap(), 0);
        assert_eq!(column_index("z").unwrap(), 25);
        assert_eq!(column_index("AA").unwrap(), 26);
        assert_eq!(column_index("AZ").unwrap(), 51);
        assert!(column_index("A1").is_err());
        assert!(column_index("").is_err());
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("B12").unwrap(), ("B".to_string(), 12));
        assert_eq!(parse_cell_ref("aa3").unwrap(), ("AA".to_string(), 3));
        assert!(parse_cell_ref("B").is_err());
        assert!(parse_cell_ref("B0").is_err());
        assert!(parse_cell_ref("12").is_err());
    }

    #[tokio::test]
    async fn test_get_cell_defaults_to_empty() {
        let sheet = MemorySheet::new();
        assert_eq!(sheet.get_cell("A1").await.unwrap(), "");
        sheet.set_cell("A1", "hello").await.unwrap();
        assert_eq!(sheet.get_cell("A1").await.unwrap(), "hello");
    }
}
