//! Market data source seam.
//!
//! The pipeline consumes prices, fundamentals, and news through this trait;
//! where the records come from (CSV files, a database, a fetcher service) is
//! a collaborator's concern. The in-memory implementation backs tests and
//! small offline runs.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{FundamentalSnapshot, NewsItem, PriceBar};

/// Errors surfaced by a market data source.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("source i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed source data: {0}")]
    Malformed(String),
}

/// Read access to the three raw inputs.
pub trait MarketData {
    /// Price bars for the symbols within [start, end], any order.
    fn prices(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError>;

    /// All fundamentals snapshots for the symbols (the as-of join needs the
    /// full history, not a date window).
    fn fundamentals(&self, symbols: &[String]) -> Result<Vec<FundamentalSnapshot>, DataError>;

    /// News items for the symbols with published timestamps within
    /// [start, end] at day granularity.
    fn news(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsItem>, DataError>;
}

/// In-memory source for tests and offline experimentation.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMarketData {
    pub bars: Vec<PriceBar>,
    pub snapshots: Vec<FundamentalSnapshot>,
    pub news: Vec<NewsItem>,
}

impl MarketData for InMemoryMarketData {
    fn prices(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError> {
        Ok(self
            .bars
            .iter()
            .filter(|b| symbols.contains(&b.symbol) && b.date >= start && b.date <= end)
            .cloned()
            .collect())
    }

    fn fundamentals(&self, symbols: &[String]) -> Result<Vec<FundamentalSnapshot>, DataError> {
        Ok(self
            .snapshots
            .iter()
            .filter(|s| symbols.contains(&s.symbol))
            .cloned()
            .collect())
    }

    fn news(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsItem>, DataError> {
        Ok(self
            .news
            .iter()
            .filter(|n| {
                symbols.contains(&n.symbol) && n.day() >= start && n.day() <= end
            })
            .cloned()
            .collect())
    }
}
