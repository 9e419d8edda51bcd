//! Forward-return labeling.
//!
//! label[t] = close[t+H] / close[t] - 1, computed strictly within one
//! instrument's own date-sorted series. The trailing H rows per instrument
//! have no forward data and are excluded from the output — never filled.
//! Attaching labels to the store updates existing feature rows only.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::PriceBar;

/// One computed forward-return label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub symbol: String,
    pub date: NaiveDate,
    pub horizon_days: u32,
    pub value: f64,
}

/// Compute forward returns for every instrument.
///
/// Bars must be grouped per symbol and sorted by date (see
/// [`crate::features::group_bars_by_symbol`]). A zero or non-finite base
/// close is numeric degeneracy: the label is skipped rather than emitted as
/// infinity.
pub fn compute_forward_returns(
    bars_by_symbol: &BTreeMap<String, Vec<PriceBar>>,
    horizon_days: u32,
) -> Vec<Label> {
    let h = horizon_days as usize;
    let mut labels = Vec::new();

    if h == 0 {
        return labels;
    }

    for (symbol, bars) in bars_by_symbol {
        if bars.len() <= h {
            continue;
        }
        for t in 0..bars.len() - h {
            let base = bars[t].close;
            let forward = bars[t + h].close;
            if base == 0.0 || !base.is_finite() || !forward.is_finite() {
                continue;
            }
            let ret = forward / base - 1.0;
            if !ret.is_finite() {
                continue;
            }
            labels.push(Label {
                symbol: symbol.clone(),
                date: bars[t].date,
                horizon_days,
                value: ret,
            });
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bars(symbol: &str, closes: &[f64]) -> Vec<PriceBar> {
        let base_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                symbol: symbol.to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1,
                adj_close: close,
            })
            .collect()
    }

    fn one_symbol(closes: &[f64]) -> BTreeMap<String, Vec<PriceBar>> {
        let mut m = BTreeMap::new();
        m.insert("AAPL".to_string(), bars("AAPL", closes));
        m
    }

    #[test]
    fn one_day_forward_returns_known_values() {
        let by_symbol = one_symbol(&[100.0, 102.0, 101.0, 103.0, 102.5]);
        let labels = compute_forward_returns(&by_symbol, 1);

        assert_eq!(labels.len(), 4); // trailing row excluded
        let expected = [
            102.0 / 100.0 - 1.0, //  0.02
            101.0 / 102.0 - 1.0, // -0.0098039...
            103.0 / 101.0 - 1.0, //  0.0198019...
            102.5 / 103.0 - 1.0, // -0.0048543...
        ];
        for (label, exp) in labels.iter().zip(expected) {
            assert!((label.value - exp).abs() < 1e-10);
        }
        assert!((labels[0].value - 0.02).abs() < 1e-12);
        assert!((labels[1].value - (-0.009_803_9)).abs() < 1e-6);
        assert!((labels[2].value - 0.019_8).abs() < 1e-4);
        assert!((labels[3].value - (-0.004_85)).abs() < 1e-5);
    }

    #[test]
    fn horizon_longer_than_series_emits_nothing() {
        let by_symbol = one_symbol(&[100.0, 101.0, 102.0]);
        let labels = compute_forward_returns(&by_symbol, 5);
        assert!(labels.is_empty());
    }

    #[test]
    fn multi_day_horizon_excludes_trailing_rows() {
        let by_symbol = one_symbol(&[100.0, 110.0, 121.0, 133.1]);
        let labels = compute_forward_returns(&by_symbol, 2);

        assert_eq!(labels.len(), 2);
        assert!((labels[0].value - 0.21).abs() < 1e-12);
        assert!((labels[1].value - (133.1 / 110.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn no_cross_instrument_shifting() {
        let mut by_symbol = BTreeMap::new();
        by_symbol.insert("A".to_string(), bars("A", &[100.0, 110.0]));
        by_symbol.insert("B".to_string(), bars("B", &[200.0, 100.0]));

        let labels = compute_forward_returns(&by_symbol, 1);
        assert_eq!(labels.len(), 2);

        let a = labels.iter().find(|l| l.symbol == "A").unwrap();
        let b = labels.iter().find(|l| l.symbol == "B").unwrap();
        assert!((a.value - 0.10).abs() < 1e-12);
        assert!((b.value - (-0.5)).abs() < 1e-12);
    }

    #[test]
    fn zero_base_close_is_skipped() {
        let by_symbol = one_symbol(&[0.0, 100.0, 110.0]);
        let labels = compute_forward_returns(&by_symbol, 1);
        // The degenerate first row produces no label; the second does.
        assert_eq!(labels.len(), 1);
        assert!((labels[0].value - 0.10).abs() < 1e-12);
    }
}
