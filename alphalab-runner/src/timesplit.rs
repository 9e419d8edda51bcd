//! Expanding-window time-series cross-validation with embargo.
//!
//! Each fold pairs an expanding training window with a fixed-size test
//! window that slides forward. An embargo gap between the end of training
//! and the start of testing keeps autocorrelated labels from bleeding
//! across the boundary.
//!
//! The arithmetic can silently produce fewer folds than requested when the
//! data is short relative to `n_splits * test_size`; invalid folds are
//! skipped with a warning rather than erroring, and the caller sees the
//! survivor count in the returned vector's length.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Configuration for split generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Number of folds requested (survivors may be fewer).
    pub n_splits: usize,
    /// Calendar days of embargo between train end and test start.
    pub embargo_days: i64,
    /// Fraction of rows in each test window.
    pub test_size: f64,
    /// Seed for reproducibility bookkeeping. The split itself is fully
    /// deterministic; the seed participates in run identity and anchors any
    /// future stochastic subsampling.
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            n_splits: 5,
            embargo_days: 2,
            test_size: 0.2,
            seed: 42,
        }
    }
}

/// One train/test partition as row indices into the caller's date-sorted rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvSplit {
    pub fold_index: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Errors from split generation.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("not enough samples ({n_samples}) for {n_splits} splits; need at least n_splits + 1")]
    NotEnoughSamples { n_samples: usize, n_splits: usize },
    #[error("no valid splits generated; reduce n_splits or embargo_days")]
    NoValidSplits,
}

/// Generate expanding-window splits with embargo over date-sorted rows.
///
/// `dates` is the per-row date column and must be sorted ascending
/// (duplicates are fine — multiple instruments share a date). Returned
/// indices point into that slice. Guarantees for every surviving fold:
/// `max(train date) + embargo_days <= min(test date)`, train and test are
/// disjoint, and train size is non-decreasing across folds.
pub fn expanding_window_split(
    dates: &[NaiveDate],
    config: &SplitConfig,
) -> Result<Vec<CvSplit>, SplitError> {
    assert!(
        dates.windows(2).all(|w| w[0] <= w[1]),
        "dates must be sorted ascending"
    );

    let n_samples = dates.len();
    if n_samples < config.n_splits + 1 {
        return Err(SplitError::NotEnoughSamples {
            n_samples,
            n_splits: config.n_splits,
        });
    }

    let test_window = ((n_samples as f64 * config.test_size) as usize).max(1);
    let step = ((n_samples - test_window) / config.n_splits).max(1);

    let mut splits = Vec::new();

    for i in 0..config.n_splits {
        let test_end = (test_window + (i + 1) * step).min(n_samples);
        let test_start = test_end - test_window;

        let test_start_date = dates[test_start];
        let test_end_date = dates[test_end - 1];

        // Train ends a full embargo before the test window opens.
        let train_end_date = if config.embargo_days > 0 {
            test_start_date - Duration::days(config.embargo_days)
        } else {
            test_start_date - Duration::days(1)
        };

        let train: Vec<usize> = (0..n_samples)
            .filter(|&j| dates[j] <= train_end_date)
            .collect();
        let test: Vec<usize> = (0..n_samples)
            .filter(|&j| dates[j] >= test_start_date && dates[j] <= test_end_date)
            .collect();

        if train.is_empty() || test.is_empty() {
            warn!(
                fold = i,
                train = train.len(),
                test = test.len(),
                "skipping fold with empty partition"
            );
            continue;
        }

        debug!(
            fold = i,
            train_end = %train_end_date,
            test_start = %test_start_date,
            test_end = %test_end_date,
            train_size = train.len(),
            test_size = test.len(),
            "generated fold"
        );

        splits.push(CvSplit {
            fold_index: i,
            train,
            test,
        });
    }

    if splits.is_empty() {
        return Err(SplitError::NoValidSplits);
    }

    Ok(splits)
}
