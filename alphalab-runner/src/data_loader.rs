//! CSV ingestion with schema validation.
//!
//! Three readers — prices, fundamentals, news — each validating required
//! columns by name before parsing a single record, so a malformed file fails
//! at the boundary instead of surfacing as NaN soup downstream. Insane price
//! bars (inverted ranges, non-positive prices) are dropped with a warning.
//! `CsvMarketData` wraps the readers behind the core `MarketData` trait;
//! fundamentals and news files are optional, prices are not.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{info, warn};

use alphalab_core::domain::{FundamentalSnapshot, NewsItem, PriceBar};
use alphalab_core::source::{DataError, MarketData};
use alphalab_core::text_sentiment::{NeutralScorer, SentimentScorer};

/// Errors from CSV ingestion.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("'{path}' is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },
    #[error("'{path}' record {line}: bad value '{value}' in column '{column}'")]
    BadValue {
        path: PathBuf,
        line: usize,
        column: String,
        value: String,
    },
    #[error("failed to read record from '{path}': {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Header layout of one CSV file: column name → index.
struct Header {
    path: PathBuf,
    indices: Vec<(String, usize)>,
}

impl Header {
    fn read(reader: &mut csv::Reader<std::fs::File>, path: &Path) -> Result<Self, LoadError> {
        let headers = reader.headers().map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            indices: headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_string(), i))
                .collect(),
        })
    }

    fn optional(&self, column: &str) -> Option<usize> {
        self.indices
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, i)| *i)
    }

    fn required(&self, column: &str) -> Result<usize, LoadError> {
        self.optional(column)
            .ok_or_else(|| LoadError::MissingColumn {
                path: self.path.clone(),
                column: column.to_string(),
            })
    }
}

fn bad_value(path: &Path, line: usize, column: &str, value: &str) -> LoadError {
    LoadError::BadValue {
        path: path.to_path_buf(),
        line,
        column: column.to_string(),
        value: value.to_string(),
    }
}

fn field<'a>(record: &'a csv::StringRecord, index: usize) -> &'a str {
    record.get(index).unwrap_or("").trim()
}

fn parse_f64(path: &Path, line: usize, column: &str, raw: &str) -> Result<f64, LoadError> {
    raw.parse::<f64>()
        .map_err(|_| bad_value(path, line, column, raw))
}

fn parse_date(path: &Path, line: usize, column: &str, raw: &str) -> Result<NaiveDate, LoadError> {
    raw.parse::<NaiveDate>()
        .map_err(|_| bad_value(path, line, column, raw))
}

/// Load price bars. Required columns:
/// symbol, date, open, high, low, close, volume, adj_close.
pub fn load_prices_csv(path: &Path) -> Result<Vec<PriceBar>, LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let header = Header::read(&mut reader, path)?;

    let symbol_i = header.required("symbol")?;
    let date_i = header.required("date")?;
    let open_i = header.required("open")?;
    let high_i = header.required("high")?;
    let low_i = header.required("low")?;
    let close_i = header.required("close")?;
    let volume_i = header.required("volume")?;
    let adj_close_i = header.required("adj_close")?;

    let mut bars = Vec::new();
    let mut dropped = 0usize;
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|source| LoadError::Record {
            path: path.to_path_buf(),
            source,
        })?;
        let line = line + 2; // 1-based, after the header

        let volume_raw = field(&record, volume_i);
        let bar = PriceBar {
            symbol: field(&record, symbol_i).to_string(),
            date: parse_date(path, line, "date", field(&record, date_i))?,
            open: parse_f64(path, line, "open", field(&record, open_i))?,
            high: parse_f64(path, line, "high", field(&record, high_i))?,
            low: parse_f64(path, line, "low", field(&record, low_i))?,
            close: parse_f64(path, line, "close", field(&record, close_i))?,
            volume: volume_raw
                .parse::<u64>()
                .map_err(|_| bad_value(path, line, "volume", volume_raw))?,
            adj_close: parse_f64(path, line, "adj_close", field(&record, adj_close_i))?,
        };

        if bar.is_sane() {
            bars.push(bar);
        } else {
            dropped += 1;
        }
    }

    if dropped > 0 {
        warn!(path = %path.display(), dropped, "dropped insane price bars");
    }
    Ok(bars)
}

/// Load fundamentals snapshots. Required columns: symbol, asof.
/// Metric columns are picked up when present; empty cells stay null.
pub fn load_fundamentals_csv(path: &Path) -> Result<Vec<FundamentalSnapshot>, LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let header = Header::read(&mut reader, path)?;

    let symbol_i = header.required("symbol")?;
    let asof_i = header.required("asof")?;
    let metric_indices: Vec<(&str, Option<usize>)> = FundamentalSnapshot::COLUMNS
        .iter()
        .map(|&col| (col, header.optional(col)))
        .collect();

    let mut snapshots = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|source| LoadError::Record {
            path: path.to_path_buf(),
            source,
        })?;
        let line = line + 2;

        let symbol = field(&record, symbol_i).to_string();
        let asof = parse_date(path, line, "asof", field(&record, asof_i))?;
        let mut snap = FundamentalSnapshot::empty(symbol, asof);

        for &(col, index) in &metric_indices {
            let raw = match index {
                Some(i) => field(&record, i),
                None => continue,
            };
            if raw.is_empty() {
                continue;
            }
            let value = parse_f64(path, line, col, raw)?;
            match col {
                "pe" => snap.pe = Some(value),
                "pb" => snap.pb = Some(value),
                "ev_ebitda" => snap.ev_ebitda = Some(value),
                "roe" => snap.roe = Some(value),
                "roce" => snap.roce = Some(value),
                "de_ratio" => snap.de_ratio = Some(value),
                "eps_g3y" => snap.eps_g3y = Some(value),
                "rev_g3y" => snap.rev_g3y = Some(value),
                "profit_g3y" => snap.profit_g3y = Some(value),
                "opm" => snap.opm = Some(value),
                "npm" => snap.npm = Some(value),
                "div_yield" => snap.div_yield = Some(value),
                "promoter_hold" => snap.promoter_hold = Some(value),
                "pledged_pct" => snap.pledged_pct = Some(value),
                _ => {}
            }
        }
        snapshots.push(snap);
    }

    Ok(snapshots)
}

/// Load news items. Required columns: symbol, published, url, sentiment.
/// `published` accepts RFC 3339-style date-times or a bare date (midnight).
///
/// An empty sentiment cell is scored from the optional `headline` column via
/// the caller's scorer handle; with the stub scorer those rows come out
/// neutral, which is logged once per file.
pub fn load_news_csv(path: &Path, scorer: &dyn SentimentScorer) -> Result<Vec<NewsItem>, LoadError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let header = Header::read(&mut reader, path)?;

    let symbol_i = header.required("symbol")?;
    let published_i = header.required("published")?;
    let url_i = header.required("url")?;
    let sentiment_i = header.required("sentiment")?;
    let headline_i = header.optional("headline");

    let mut items = Vec::new();
    let mut scored = 0usize;
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|source| LoadError::Record {
            path: path.to_path_buf(),
            source,
        })?;
        let line = line + 2;

        let raw_ts = field(&record, published_i);
        let published = parse_timestamp(raw_ts)
            .ok_or_else(|| bad_value(path, line, "published", raw_ts))?;

        let raw_sentiment = field(&record, sentiment_i);
        let sentiment = if raw_sentiment.is_empty() {
            let headline = headline_i.map(|i| field(&record, i)).unwrap_or("");
            if headline.is_empty() {
                return Err(bad_value(path, line, "sentiment", raw_sentiment));
            }
            scored += 1;
            scorer.score(headline).compound
        } else {
            parse_f64(path, line, "sentiment", raw_sentiment)?
        };

        items.push(NewsItem {
            symbol: field(&record, symbol_i).to_string(),
            published,
            url: field(&record, url_i).to_string(),
            sentiment,
        });
    }

    if scored > 0 && !scorer.is_available() {
        warn!(
            path = %path.display(),
            scored,
            "no sentiment model available, scored headlines as neutral"
        );
    }

    Ok(items)
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts);
    }
    raw.parse::<NaiveDate>()
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// File-backed market data: `prices.csv`, `fundamentals.csv`, `news.csv`
/// under one directory. Prices are mandatory; the other two degrade to empty.
///
/// The sentiment scorer handle is supplied by the caller and shared for the
/// whole ingestion pass; the default is the neutral stub.
#[derive(Clone)]
pub struct CsvMarketData {
    dir: PathBuf,
    scorer: Arc<dyn SentimentScorer>,
}

impl CsvMarketData {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            scorer: Arc::new(NeutralScorer),
        }
    }

    /// Use a real scorer for rows that arrive without a sentiment value.
    pub fn with_scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    fn optional_file<T>(
        &self,
        name: &str,
        load: impl Fn(&Path) -> Result<Vec<T>, LoadError>,
    ) -> Result<Vec<T>, DataError> {
        let path = self.dir.join(name);
        if !path.exists() {
            info!(path = %path.display(), "optional data file absent, treating as empty");
            return Ok(Vec::new());
        }
        load(&path).map_err(|e| DataError::Malformed(e.to_string()))
    }
}

impl MarketData for CsvMarketData {
    fn prices(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError> {
        let path = self.dir.join("prices.csv");
        let bars = load_prices_csv(&path).map_err(|e| DataError::Malformed(e.to_string()))?;
        Ok(bars
            .into_iter()
            .filter(|b| symbols.contains(&b.symbol) && b.date >= start && b.date <= end)
            .collect())
    }

    fn fundamentals(&self, symbols: &[String]) -> Result<Vec<FundamentalSnapshot>, DataError> {
        let snaps = self.optional_file("fundamentals.csv", load_fundamentals_csv)?;
        Ok(snaps
            .into_iter()
            .filter(|s| symbols.contains(&s.symbol))
            .collect())
    }

    fn news(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NewsItem>, DataError> {
        let items =
            self.optional_file("news.csv", |p| load_news_csv(p, self.scorer.as_ref()))?;
        Ok(items
            .into_iter()
            .filter(|n| symbols.contains(&n.symbol) && n.day() >= start && n.day() <= end)
            .collect())
    }
}
