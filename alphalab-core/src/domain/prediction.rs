//! Prediction — one model output row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Forecast for one (symbol, date, horizon).
///
/// The horizon is part of the identity because several horizons may coexist
/// for the same day. `yhat_std` is a tree-subset heuristic, not a calibrated
/// interval — see the model crate for the exact construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub symbol: String,
    pub date: NaiveDate,
    pub horizon_days: u32,
    /// Point estimate of the forward return.
    pub yhat: f64,
    /// Heuristic uncertainty estimate.
    pub yhat_std: f64,
    /// Probability the return is positive, clipped to [0.01, 0.99].
    pub prob_up: f64,
}
