//! Gradient-boosted regression model.
//!
//! The ensemble is owned by this crate: depth-bounded variance-reduction
//! regression trees fit to residuals under shrinkage, with seeded row and
//! feature subsampling. Owning the trees is what makes per-iteration staged
//! predictions (the uncertainty heuristic) and gain importances available.

pub mod gbm;
pub mod tree;

use std::collections::BTreeSet;

use alphalab_core::frame::FeatureRow;

pub use gbm::{GbmModel, GbmParams, ModelError, DEFAULT_UNCERTAINTY_WINDOW};
pub use tree::RegressionTree;

/// Column-major feature matrix: `columns[f][r]` is feature f of row r.
///
/// Column-major layout suits split search, which scans one feature across
/// all rows at a time.
#[derive(Debug, Clone, Default)]
pub struct ColumnMatrix {
    pub n_rows: usize,
    pub columns: Vec<Vec<f64>>,
}

impl ColumnMatrix {
    pub fn new(n_rows: usize, n_features: usize) -> Self {
        Self {
            n_rows,
            columns: vec![vec![0.0; n_rows]; n_features],
        }
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// One row as an owned feature vector.
    pub fn row(&self, r: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[r]).collect()
    }

    /// A new matrix containing only the given rows, in the given order.
    pub fn gather(&self, rows: &[usize]) -> ColumnMatrix {
        ColumnMatrix {
            n_rows: rows.len(),
            columns: self
                .columns
                .iter()
                .map(|col| rows.iter().map(|&r| col[r]).collect())
                .collect(),
        }
    }
}

/// Sorted union of feature names across rows — the model's column order.
///
/// The feature schema is open, so the union (not any single row) defines the
/// matrix layout, and sorting keeps it deterministic across runs.
pub fn feature_columns(rows: &[FeatureRow]) -> Vec<String> {
    let mut names: BTreeSet<&str> = BTreeSet::new();
    for row in rows {
        for name in row.values.keys() {
            names.insert(name);
        }
    }
    names.into_iter().map(String::from).collect()
}

/// Build a column-major matrix from rows under a fixed column order.
///
/// Absent features become 0.0 — the same fill the cleaner applies, so
/// training and inference see identical semantics for "missing".
pub fn matrix_from_feature_rows(rows: &[FeatureRow], columns: &[String]) -> ColumnMatrix {
    let mut m = ColumnMatrix::new(rows.len(), columns.len());
    for (f, col) in columns.iter().enumerate() {
        for (r, row) in rows.iter().enumerate() {
            if let Some(&v) = row.values.get(col) {
                if v.is_finite() {
                    m.columns[f][r] = v;
                }
            }
        }
    }
    m
}
