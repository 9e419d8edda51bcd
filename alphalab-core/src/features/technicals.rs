//! Technical indicator stage — per-instrument rolling statistics.
//!
//! Produces the base feature frame whose (symbol, date) keys define the row
//! universe for the whole pipeline. Instruments with fewer than `MIN_BARS`
//! bars, or whose computation fails, still emit every indicator column as
//! NaN so the schema stays uniform and one bad instrument never aborts the
//! batch.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::PriceBar;
use crate::frame::FeatureFrame;
use crate::indicators::{adx, atr, bollinger, ema, macd, pct_change, realized_volatility, rsi, sma};

/// Minimum bars before any indicator is attempted for an instrument.
pub const MIN_BARS: usize = 20;

/// All indicator columns, in emission order.
pub const TECHNICAL_COLUMNS: &[&str] = &[
    "sma_20",
    "sma_50",
    "sma_200",
    "ema_20",
    "ema_50",
    "ema_200",
    "rsi_14",
    "macd",
    "macd_signal",
    "macd_diff",
    "adx_14",
    "atr_14",
    "bb_high",
    "bb_low",
    "bb_mid",
    "bb_width",
    "momentum_20",
    "momentum_60",
    "rv_20",
];

/// Per-instrument computation failure. Isolated to the instrument: the stage
/// logs it and emits all-NaN columns instead of aborting the batch.
#[derive(Debug, Error)]
pub enum TechnicalsError {
    #[error("bars for '{symbol}' are not strictly ordered by date at index {index}")]
    UnorderedBars { symbol: String, index: usize },
}

/// Group a flat bar list by symbol, each group sorted by date.
///
/// Later duplicates of the same (symbol, date) overwrite earlier ones — the
/// upsert-on-correction rule for price bars.
pub fn group_bars_by_symbol(bars: Vec<PriceBar>) -> BTreeMap<String, Vec<PriceBar>> {
    let mut by_symbol: BTreeMap<String, BTreeMap<chrono::NaiveDate, PriceBar>> = BTreeMap::new();
    for bar in bars {
        by_symbol
            .entry(bar.symbol.clone())
            .or_default()
            .insert(bar.date, bar);
    }
    by_symbol
        .into_iter()
        .map(|(sym, dated)| (sym, dated.into_values().collect()))
        .collect()
}

/// Compute the full indicator column set over all instruments.
pub fn compute_technical_indicators(
    bars_by_symbol: &BTreeMap<String, Vec<PriceBar>>,
) -> FeatureFrame {
    let keys: Vec<(String, chrono::NaiveDate)> = bars_by_symbol
        .iter()
        .flat_map(|(sym, bars)| bars.iter().map(move |b| (sym.clone(), b.date)))
        .collect();
    let mut frame = FeatureFrame::from_keys(keys);

    for col in TECHNICAL_COLUMNS {
        frame.ensure_column(col);
    }

    for (symbol, range) in frame.symbol_ranges() {
        let bars = match bars_by_symbol.get(&symbol) {
            Some(b) => b,
            None => continue,
        };

        if bars.len() < MIN_BARS {
            debug!(%symbol, rows = bars.len(), "insufficient history, emitting NaN indicators");
            continue;
        }

        if let Err(e) = compute_for_instrument(&mut frame, &symbol, range.clone(), bars) {
            warn!(%symbol, error = %e, "indicator computation failed, emitting NaN indicators");
            for col in TECHNICAL_COLUMNS {
                let series = frame.column_mut(col).expect("column ensured above");
                for slot in &mut series[range.clone()] {
                    *slot = f64::NAN;
                }
            }
        }
    }

    frame
}

fn compute_for_instrument(
    frame: &mut FeatureFrame,
    symbol: &str,
    range: std::ops::Range<usize>,
    bars: &[PriceBar],
) -> Result<(), TechnicalsError> {
    for i in 1..bars.len() {
        if bars[i].date <= bars[i - 1].date {
            return Err(TechnicalsError::UnorderedBars {
                symbol: symbol.to_string(),
                index: i,
            });
        }
    }

    // Price-based kernels use the adjusted close; range-based use raw OHLC.
    let closes: Vec<f64> = bars.iter().map(|b| b.adj_close).collect();

    let mut write = |name: &str, values: Vec<f64>| {
        debug_assert_eq!(values.len(), range.len());
        let series = frame.column_mut(name).expect("column ensured above");
        series[range.clone()].copy_from_slice(&values);
    };

    write("sma_20", sma(&closes, 20));
    write("sma_50", sma(&closes, 50));
    write("sma_200", sma(&closes, 200));

    write("ema_20", ema(&closes, 20));
    write("ema_50", ema(&closes, 50));
    write("ema_200", ema(&closes, 200));

    write("rsi_14", rsi(&closes, 14));

    let m = macd(&closes, 12, 26, 9);
    write("macd", m.line);
    write("macd_signal", m.signal);
    write("macd_diff", m.histogram);

    write("adx_14", adx(bars, 14));
    write("atr_14", atr(bars, 14));

    let bands = bollinger(&closes, 20, 2.0);
    let width: Vec<f64> = bands
        .upper
        .iter()
        .zip(&bands.lower)
        .zip(&bands.middle)
        .map(|((u, l), m)| {
            if m.is_nan() || *m == 0.0 {
                f64::NAN
            } else {
                let w = (u - l) / m;
                if w.is_finite() {
                    w
                } else {
                    f64::NAN
                }
            }
        })
        .collect();
    write("bb_high", bands.upper);
    write("bb_low", bands.lower);
    write("bb_mid", bands.middle);
    write("bb_width", width);

    write("momentum_20", pct_change(&closes, 20));
    write("momentum_60", pct_change(&closes, 60));

    write("rv_20", realized_volatility(&closes, 20));

    Ok(())
}
