//! ADX — Average Directional Index (Wilder).
//!
//! Steps:
//! 1. Compute +DM and -DM from consecutive bars
//! 2. Smooth +DM, -DM, and TR using Wilder smoothing (alpha = 1/period)
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR)
//! 4. -DI = 100 * smoothed(-DM) / smoothed(TR)
//! 5. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 6. ADX = Wilder-smoothed DX
//!
//! Warm-up: 2 * period (period for DI smoothing, then period for ADX smoothing).

use crate::domain::PriceBar;
use crate::indicators::atr::{true_range, wilder_smooth};

/// ADX over bars.
pub fn adx(bars: &[PriceBar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let result = vec![f64::NAN; n];

    if period == 0 || n < 2 {
        return result;
    }

    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];

    for i in 1..n {
        if bars[i].high.is_nan()
            || bars[i].low.is_nan()
            || bars[i - 1].high.is_nan()
            || bars[i - 1].low.is_nan()
        {
            continue;
        }

        let high_diff = bars[i].high - bars[i - 1].high;
        let low_diff = bars[i - 1].low - bars[i].low;

        plus_dm[i] = if high_diff > low_diff && high_diff > 0.0 {
            high_diff
        } else {
            0.0
        };
        minus_dm[i] = if low_diff > high_diff && low_diff > 0.0 {
            low_diff
        } else {
            0.0
        };
    }

    let mut tr = true_range(bars);
    if !tr.is_empty() {
        tr[0] = f64::NAN; // no previous close
    }

    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);
    let smooth_tr = wilder_smooth(&tr, period);

    // DX: directional movement as a fraction of range. Zero range → NaN.
    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        let sp = smooth_plus[i];
        let sm = smooth_minus[i];
        let st = smooth_tr[i];
        if sp.is_nan() || sm.is_nan() || st.is_nan() || st == 0.0 {
            continue;
        }
        let plus_di = 100.0 * sp / st;
        let minus_di = 100.0 * sm / st;
        let denom = plus_di + minus_di;
        if denom == 0.0 {
            continue;
        }
        dx[i] = 100.0 * (plus_di - minus_di).abs() / denom;
    }

    wilder_smooth(&dx, period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_trending_bars(n: usize, step: f64) -> Vec<PriceBar> {
        let base_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + step * i as f64;
                PriceBar {
                    symbol: "TEST".to_string(),
                    date: base_date + chrono::Duration::days(i as i64),
                    open: close - step,
                    high: close + 1.0,
                    low: close - step - 1.0,
                    close,
                    volume: 1000,
                    adj_close: close,
                }
            })
            .collect()
    }

    #[test]
    fn adx_warmup_is_two_periods() {
        let bars = make_trending_bars(30, 2.0);
        let result = adx(&bars, 5);
        // First valid ADX needs period bars of DX, which itself needs period
        // bars of smoothed DM; DM starts at index 1.
        for v in result.iter().take(9) {
            assert!(v.is_nan());
        }
        assert!(!result[9].is_nan());
    }

    #[test]
    fn adx_strong_trend_is_high() {
        let bars = make_trending_bars(40, 2.0);
        let result = adx(&bars, 5);
        let last = result[39];
        assert!(last > 50.0, "strong uptrend should give high ADX, got {last}");
    }

    #[test]
    fn adx_bounds() {
        let bars = make_trending_bars(40, 1.0);
        let result = adx(&bars, 5);
        for &v in &result {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "ADX out of bounds: {v}");
            }
        }
    }

    #[test]
    fn adx_too_few_bars_all_nan() {
        let bars = make_trending_bars(3, 1.0);
        let result = adx(&bars, 14);
        assert!(result.iter().all(|v| v.is_nan()));
    }
}
