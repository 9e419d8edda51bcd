//! Composite scoring — percentile-ranked sub-scores and their weighted blend.
//!
//! Four sub-dimensions (quality, valuation, momentum, sentiment) each select
//! whichever of their candidate source columns exist, scale every source to
//! [0, 1] by same-date cross-sectional percentile rank (missing → neutral
//! 0.5), and average. A dimension with no sources at all is a constant 0.5.
//! The composite is the weighted sum of the four dimension scores;
//! `risk_adjusted_score` currently equals the composite and is a placeholder
//! for a future risk adjustment — callers must not assume the two fields are
//! independent.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::frame::FeatureFrame;

/// Candidate source columns per dimension.
const QUALITY_SOURCES: &[&str] = &["roe", "roce", "opm", "npm"];
const VALUATION_SOURCES: &[&str] = &["pe_vs_sector", "pb_vs_sector"];
const MOMENTUM_SOURCES: &[&str] = &["momentum_20", "momentum_60", "rsi_14"];
const SENTIMENT_SOURCES: &[&str] = &["sent_mean_comp", "sent_ma_7d"];

/// Non-negative blend weights for the four sub-dimensions.
///
/// They need not sum to one, though they typically do. Malformed
/// configuration falls back to [`CompositeWeights::equal_split`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    pub quality: f64,
    pub valuation: f64,
    pub momentum: f64,
    pub sentiment: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            quality: 0.3,
            valuation: 0.25,
            momentum: 0.25,
            sentiment: 0.2,
        }
    }
}

impl CompositeWeights {
    /// The documented fallback: every dimension weighted equally.
    pub fn equal_split() -> Self {
        Self {
            quality: 0.25,
            valuation: 0.25,
            momentum: 0.25,
            sentiment: 0.25,
        }
    }

    /// Replace malformed weights (negative, non-finite, or all zero) with the
    /// equal split.
    pub fn sanitized(self) -> Self {
        let vals = [self.quality, self.valuation, self.momentum, self.sentiment];
        let malformed =
            vals.iter().any(|w| !w.is_finite() || *w < 0.0) || vals.iter().sum::<f64>() == 0.0;
        if malformed {
            warn!(?self, "malformed composite weights, falling back to equal split");
            Self::equal_split()
        } else {
            self
        }
    }

    /// Parse from a raw TOML value, falling back to the equal split when the
    /// shape is unparseable.
    pub fn from_toml(value: toml::Value) -> Self {
        match value.try_into::<CompositeWeights>() {
            Ok(w) => w.sanitized(),
            Err(e) => {
                warn!(error = %e, "unparseable composite weights, falling back to equal split");
                Self::equal_split()
            }
        }
    }
}

/// Add the four dimension scores, the composite, and the risk-adjusted score.
pub fn compute_composite_scores(frame: &mut FeatureFrame, weights: &CompositeWeights) {
    let weights = weights.sanitized();

    let quality = dimension_score(frame, "quality", QUALITY_SOURCES);
    let valuation = dimension_score(frame, "valuation", VALUATION_SOURCES);
    let momentum = dimension_score(frame, "momentum", MOMENTUM_SOURCES);
    let sentiment = dimension_score(frame, "sentiment", SENTIMENT_SOURCES);

    let composite: Vec<f64> = (0..frame.len())
        .map(|i| {
            weights.quality * quality[i]
                + weights.valuation * valuation[i]
                + weights.momentum * momentum[i]
                + weights.sentiment * sentiment[i]
        })
        .collect();

    frame.set_column("quality_score", quality);
    frame.set_column("valuation_score", valuation);
    frame.set_column("momentum_score", momentum);
    frame.set_column("sentiment_score", sentiment);
    // Placeholder: identical to the composite until a real risk adjustment lands.
    frame.set_column("risk_adjusted_score", composite.clone());
    frame.set_column("composite_score", composite);
}

fn dimension_score(frame: &FeatureFrame, dimension: &str, sources: &[&str]) -> Vec<f64> {
    let present: Vec<&str> = sources
        .iter()
        .copied()
        .filter(|c| frame.has_column(c))
        .collect();

    if present.is_empty() {
        warn!(dimension, "no source columns available, defaulting score to 0.5");
        return vec![0.5; frame.len()];
    }

    let scaled: Vec<Vec<f64>> = present
        .iter()
        .map(|col| percentile_rank_by_date(frame, col))
        .collect();

    (0..frame.len())
        .map(|i| scaled.iter().map(|s| s[i]).sum::<f64>() / scaled.len() as f64)
        .collect()
}

/// Scale a column to [0, 1] by same-date fractional rank.
///
/// Ties get the average of their ranks; missing values map to the neutral
/// 0.5; output is clipped to [0, 1].
fn percentile_rank_by_date(frame: &FeatureFrame, column: &str) -> Vec<f64> {
    let mut out = vec![0.5; frame.len()];

    for rows in frame.date_groups().values() {
        let mut finite: Vec<(usize, f64)> = rows
            .iter()
            .map(|&r| (r, frame.value(column, r)))
            .filter(|(_, v)| !v.is_nan())
            .collect();
        if finite.is_empty() {
            continue;
        }

        finite.sort_by(|a, b| a.1.partial_cmp(&b.1).expect("finite values compare"));
        let n = finite.len() as f64;

        // Average rank over tie runs, scaled by the group size.
        let mut i = 0usize;
        while i < finite.len() {
            let mut j = i;
            while j + 1 < finite.len() && finite[j + 1].1 == finite[i].1 {
                j += 1;
            }
            // 1-based ranks i+1 ..= j+1 share the average.
            let avg_rank = (i + 1 + j + 1) as f64 / 2.0;
            let pct = (avg_rank / n).clamp(0.0, 1.0);
            for &(row, _) in &finite[i..=j] {
                out[row] = pct;
            }
            i = j + 1;
        }
    }

    out
}
