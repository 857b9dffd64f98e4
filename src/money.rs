//! Euro amounts as they appear on the market and in the sheet
//!
//! Wire format is `1.234,56€`: optional thousands dots, decimal comma,
//! trailing currency symbol. Values are written back without grouping
//! (`1234,56€`). Everything in between works on plain `f64`.

use crate::error::{AppError, Result};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};

pub const CURRENCY_SYMBOL: char = '€';

/// A currency value with 2-decimal display semantics
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Money(f64);

impl Money {
    pub const ZERO: Money = Money(0.0);

    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Parse a sheet or market string.
    ///
    /// Every thousands dot is removed before the decimal comma is converted,
    /// otherwise `1.234,56` would read as `1.234`.
    pub fn parse(raw: &str) -> Result<Self> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(AppError::Parse("empty currency value".to_string()));
        }

        let normalized = compact
            .replace('.', "")
            .replacen(CURRENCY_SYMBOL, "", 1)
            .replacen(',', ".", 1);

        normalized
            .parse::<f64>()
            .map(Money)
            .map_err(|e| AppError::Parse(format!("invalid currency value '{}': {}", raw, e)))
    }

    /// Parse a market listing price, dropping the `-` placeholders the
    /// market uses for whole amounts (`1,--€`).
    pub fn parse_listing(raw: &str) -> Result<Self> {
        Self::parse(&raw.replace('-', ""))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = (self.0 * 100.0).round() / 100.0;
        if value == 0.0 {
            value = 0.0; // no "-0,00€"
        }
        let text = format!("{:.2}", value).replacen('.', ",", 1);
        write!(f, "{}{}", text, CURRENCY_SYMBOL)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Mul<u64> for Money {
    type Output = Money;

    fn mul(self, rhs: u64) -> Money {
        Money(self.0 * rhs as f64)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_grouped() {
        assert_eq!(Money::parse("10,00€").unwrap().as_f64(), 10.0);
        assert!((Money::parse("1.234,56€").unwrap().as_f64() - 1234.56).abs() < 1e-9);
        assert!((Money::parse("1.234.567,89€").unwrap().as_f64() - 1_234_567.89).abs() < 1e-6);
        assert!((Money::parse(" 0,03 € ").unwrap().as_f64() - 0.03).abs() < 1e-9);
        assert!((Money::parse("-12,50€").unwrap().as_f64() + 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Money::parse(""), Err(AppError::Parse(_))));
        assert!(matches!(Money::parse("abc"), Err(AppError::Parse(_))));
    }

    #[test]
    fn test_listing_placeholder_dashes() {
        assert_eq!(Money::parse_listing("1,--€").unwrap().as_f64(), 1.0);
        assert!((Money::parse_listing("2,5-€").unwrap().as_f64() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_format_has_no_grouping() {
        assert_eq!(Money::new(1234.5).to_string(), "1234,50€");
        assert_eq!(Money::new(-3.456).to_string(), "-3,46€");
        assert_eq!(Money::new(-0.001).to_string(), "0,00€");
        assert_eq!(Money::ZERO.to_string(), "0,00€");
    }

    #[test]
    fn test_round_trip_within_a_cent() {
        for raw in ["0,01€", "7,99€", "1.000,00€", "12.345,67€", "999,99€", "1.234.567,89€"] {
            let first = Money::parse(raw).unwrap();
            let again = Money::parse(&first.to_string()).unwrap();
            assert!((first.as_f64() - again.as_f64()).abs() < 0.01, "{}", raw);
        }
    }

    #[test]
    fn test_arithmetic() {
        let total: Money = [Money::new(1.5), Money::new(2.25)].into_iter().sum();
        assert_eq!(total.to_string(), "3,75€");
        assert_eq!((Money::new(10.0) * 2).to_string(), "20,00€");
        assert_eq!((Money::new(5.0) - Money::new(7.5)).to_string(), "-2,50€");
    }
}
