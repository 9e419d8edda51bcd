//! Realized volatility — rolling standard deviation of daily returns.
//!
//! returns[t] = value[t] / value[t-1] - 1
//! rv[t] = sample stddev (divide by N-1) of returns[t-window+1 ..= t]
//! Warm-up: window leading NaN (one bar for the first return plus the window).

use crate::indicators::momentum::pct_change;

/// Rolling sample standard deviation of one-step returns.
pub fn realized_volatility(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if window < 2 || n < window + 1 {
        return result;
    }

    let returns = pct_change(values, 1);

    for i in window..n {
        let slice = &returns[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var =
            slice.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (window as f64 - 1.0);
        result[i] = var.sqrt();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    #[test]
    fn rv_constant_returns_is_zero() {
        // 1% growth every day → identical returns → zero stddev.
        let values: Vec<f64> = (0..10).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let result = realized_volatility(&values, 3);
        assert!(result[2].is_nan());
        assert_approx(result[3], 0.0, 1e-12);
        assert_approx(result[9], 0.0, 1e-12);
    }

    #[test]
    fn rv_known_values() {
        // Returns: 0.10, -0.10, 0.10 over window 3 at index 3.
        let values = [100.0, 110.0, 99.0, 108.9];
        let result = realized_volatility(&values, 3);

        let rets = [0.1, -0.1, 0.1];
        let mean: f64 = rets.iter().sum::<f64>() / 3.0;
        let var: f64 = rets.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / 2.0;
        assert_approx(result[3], var.sqrt(), 1e-9);
    }

    #[test]
    fn rv_warmup_prefix() {
        let values: Vec<f64> = (0..6).map(|i| 100.0 + i as f64).collect();
        let result = realized_volatility(&values, 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!(result[2].is_nan());
        assert!(!result[3].is_nan());
    }
}
