//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! middle = SMA(period), upper/lower = middle ± mult * stddev(period).
//! Uses population stddev (divide by N). Warm-up: period - 1.
//! The width metric (upper - lower) / middle belongs to the technicals
//! stage, which owns the zero-middle → NaN mapping.

/// The three band series, all the same length as the input.
#[derive(Debug, Clone)]
pub struct BollingerSeries {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Bollinger bands over a value series.
pub fn bollinger(values: &[f64], period: usize, multiplier: f64) -> BollingerSeries {
    let n = values.len();
    let mut upper = vec![f64::NAN; n];
    let mut middle = vec![f64::NAN; n];
    let mut lower = vec![f64::NAN; n];

    if period == 0 || n < period {
        return BollingerSeries {
            upper,
            middle,
            lower,
        };
    }

    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }

        let mean = window.iter().sum::<f64>() / period as f64;
        let var = window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / period as f64;
        let sd = var.sqrt();

        middle[i] = mean;
        upper[i] = mean + multiplier * sd;
        lower[i] = mean - multiplier * sd;
    }

    BollingerSeries {
        upper,
        middle,
        lower,
    }
}
