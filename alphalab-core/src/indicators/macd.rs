//! MACD — Moving Average Convergence Divergence.
//!
//! line = EMA(fast) - EMA(slow)
//! signal = EMA(signal_period) of the line
//! histogram = line - signal
//!
//! Warm-up: slow - 1 bars for the line, plus signal_period - 1 for the signal.

use crate::indicators::ema::ema;

/// The three MACD output series, all the same length as the input.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD over a value series.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdSeries {
    let n = values.len();
    let nan = vec![f64::NAN; n];

    if fast == 0 || slow == 0 || signal_period == 0 {
        return MacdSeries {
            line: nan.clone(),
            signal: nan.clone(),
            histogram: nan,
        };
    }

    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);

    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s) // NaN - x = NaN, so warm-up propagates
        .collect();

    // The line has a NaN warm-up prefix; ema() seeds past it.
    let signal = ema(&line, signal_period);

    let histogram: Vec<f64> = line.iter().zip(&signal).map(|(l, s)| l - s).collect();

    MacdSeries {
        line,
        signal,
        histogram,
    }
}
