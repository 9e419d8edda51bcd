//! Per-instrument indicator kernels.
//!
//! Each kernel is a pure function: an ordered price series (or bar slice) in,
//! a numeric series of the same length out, with NaN for the warm-up prefix
//! and for any position whose input window contains NaN. Kernels never see
//! more than one instrument; the technicals stage drives them per symbol.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod momentum;
pub mod rsi;
pub mod sma;
pub mod volatility;

pub use adx::adx;
pub use atr::{atr, true_range, wilder_smooth};
pub use bollinger::{bollinger, BollingerSeries};
pub use ema::ema;
pub use macd::{macd, MacdSeries};
pub use momentum::pct_change;
pub use rsi::rsi;
pub use sma::sma;
pub use volatility::realized_volatility;

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
