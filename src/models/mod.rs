use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("invalid ticker {0:?}: must be non-empty with no whitespace or path separators")]
    InvalidTicker(String),

    #[error("invalid date range: start {start} must be before end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

// ── Ticker ────────────────────────────────────────────────────────────────────

/// Exchange symbol, e.g. `NVDA` or the index form `^IXIC`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let symbol = raw.trim().to_uppercase();
        let bad_char = |c: char| c.is_whitespace() || c == '/' || c == '\\';
        if symbol.is_empty() || symbol.chars().any(bad_char) {
            return Err(ModelError::InvalidTicker(raw.to_string()));
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `NVDA` → `NVDA_stock_data.csv`
    pub fn output_file_name(&self) -> String {
        format!("{}_stock_data.csv", self.0)
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Date range ────────────────────────────────────────────────────────────────

/// Start is inclusive, end is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ModelError> {
        if start >= end {
            return Err(ModelError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ── Daily bar ─────────────────────────────────────────────────────────────────

/// One trading day as the provider reported it. `None` means the provider
/// sent a null for that field.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: Ticker,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn empty(ticker: Ticker) -> Self {
        Self { ticker, bars: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_ticker_normalises_case_and_whitespace() {
        assert_eq!(Ticker::parse(" nvda ").unwrap().as_str(), "NVDA");
        assert_eq!(Ticker::parse("^ixic").unwrap().as_str(), "^IXIC");
        assert_eq!(Ticker::parse("BRK-B").unwrap().as_str(), "BRK-B");
    }

    #[test]
    fn test_ticker_rejects_unusable_symbols() {
        for raw in ["", "   ", "BRK B", "../etc", "A\\B"] {
            assert!(Ticker::parse(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(Ticker::parse("NVDA").unwrap().output_file_name(), "NVDA_stock_data.csv");
        assert_eq!(Ticker::parse("^IXIC").unwrap().output_file_name(), "^IXIC_stock_data.csv");
    }

    #[test]
    fn test_date_range_requires_start_before_end() {
        let r = DateRange::new(date("2023-07-01"), date("2025-04-30")).unwrap();
        assert_eq!(r.to_string(), "2023-07-01..2025-04-30");

        assert_eq!(
            DateRange::new(date("2024-01-01"), date("2024-01-01")),
            Err(ModelError::InvalidRange { start: date("2024-01-01"), end: date("2024-01-01") })
        );
        assert!(DateRange::new(date("2025-01-01"), date("2024-01-01")).is_err());
    }
}
