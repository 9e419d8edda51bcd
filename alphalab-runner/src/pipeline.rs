//! Pipeline entry points exposed to collaborators.
//!
//! `compute_features` runs the full feature stack — technicals, as-of
//! fundamentals, relative valuation, sentiment, join/clean, composite — and
//! idempotently upserts the resulting rows. `compute_labels` computes
//! forward returns and attaches them to existing rows. Both return
//! structured counts; per-instrument failures inside the stages surface as
//! warnings and NaN-filled rows, never as batch aborts.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use alphalab_core::config::{ConfigError, PipelineConfig};
use alphalab_core::features::{
    aggregate_news_sentiment, asof_join_fundamentals, clean_features,
    compute_composite_scores, compute_technical_indicators, group_bars_by_symbol,
    join_features, relative_valuation,
};
use alphalab_core::labeling::compute_forward_returns;
use alphalab_core::source::{DataError, MarketData};
use alphalab_core::store::FeatureStore;

/// Errors from the pipeline entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("data source error: {0}")]
    Data(#[from] DataError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Resolve the symbol universe: explicit list, or the configured tickers.
fn resolve_symbols(config: &PipelineConfig, symbols: &[String]) -> Vec<String> {
    if symbols.is_empty() {
        config.tickers.clone()
    } else {
        symbols.to_vec()
    }
}

/// Compute and upsert the feature table for [start, end].
///
/// Returns per-instrument row counts. Indicators are computed over the full
/// fetched history and rows are filtered back to the requested range before
/// upsert, so a caller that fetches with lookback runway still gets exactly
/// the rows it asked for. Re-running the same range refreshes values without
/// creating duplicates.
pub fn compute_features(
    source: &dyn MarketData,
    store: &mut dyn FeatureStore,
    config: &PipelineConfig,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BTreeMap<String, usize>, PipelineError> {
    let symbols = resolve_symbols(config, symbols);
    if symbols.is_empty() {
        warn!("no symbols requested and no configured tickers");
        return Ok(BTreeMap::new());
    }

    info!(
        symbols = symbols.len(),
        %start,
        %end,
        "computing features"
    );

    let bars = source.prices(&symbols, start, end)?;
    if bars.is_empty() {
        warn!("no price data available");
        return Ok(BTreeMap::new());
    }
    let snapshots = source.fundamentals(&symbols)?;
    let news = source.news(&symbols, start, end)?;
    info!(
        prices = bars.len(),
        fundamentals = snapshots.len(),
        news = news.len(),
        "loaded raw inputs"
    );

    let bars_by_symbol = group_bars_by_symbol(bars);

    let technicals = compute_technical_indicators(&bars_by_symbol);

    let mut fundamentals = asof_join_fundamentals(
        &technicals,
        &snapshots,
        config.fundamentals_staleness_days,
    );
    let sector_map = config.load_sector_map()?;
    relative_valuation(&mut fundamentals, sector_map.as_ref());

    let sentiment = aggregate_news_sentiment(&technicals, &news);

    let mut frame = join_features(technicals, &fundamentals, &sentiment);
    clean_features(&mut frame, config.nan_drop_threshold);
    compute_composite_scores(&mut frame, &config.composite_weights);

    // Indicators needed the whole fetched history; the caller only asked for
    // rows inside [start, end].
    frame.retain_date_range(start, end);

    let rows = frame.to_rows();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in &rows {
        *counts.entry(row.symbol.clone()).or_insert(0) += 1;
    }
    let written = store.upsert_features(rows);

    info!(rows = written, instruments = counts.len(), "upserted feature rows");
    Ok(counts)
}

/// Compute forward-return labels and attach them to existing feature rows.
///
/// Returns the number of rows updated. Labels without a matching feature row
/// are dropped (and logged), never created.
pub fn compute_labels(
    source: &dyn MarketData,
    store: &mut dyn FeatureStore,
    config: &PipelineConfig,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
    horizon_days: u32,
) -> Result<usize, PipelineError> {
    let symbols = resolve_symbols(config, symbols);
    if symbols.is_empty() {
        warn!("no symbols requested and no configured tickers");
        return Ok(0);
    }

    let bars = source.prices(&symbols, start, end)?;
    if bars.is_empty() {
        warn!("no price data available for labeling");
        return Ok(0);
    }

    let bars_by_symbol = group_bars_by_symbol(bars);
    let labels = compute_forward_returns(&bars_by_symbol, horizon_days);
    info!(labels = labels.len(), horizon_days, "computed forward returns");

    let outcome = store.attach_labels(&labels);
    info!(
        updated = outcome.updated,
        dropped = outcome.dropped,
        "attached labels"
    );
    Ok(outcome.updated)
}
