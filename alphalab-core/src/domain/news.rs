//! NewsItem — one headline with its sentiment polarity.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single news item for a symbol. Append-only; never updated.
///
/// `url` is the dedup key: the same story syndicated twice within an
/// aggregation window must count once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub symbol: String,
    pub published: NaiveDateTime,
    pub url: String,
    /// Compound sentiment polarity in [-1, 1].
    pub sentiment: f64,
}

impl NewsItem {
    /// Day-granularity date the item belongs to for aggregation.
    pub fn day(&self) -> chrono::NaiveDate {
        self.published.date()
    }
}
