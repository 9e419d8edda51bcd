//! Gradient-boosted ensemble with early stopping and staged-prediction
//! uncertainty.
//!
//! Squared-error boosting: each round fits a regression tree to the current
//! residuals on a seeded row subsample, searching a seeded feature subsample,
//! and adds it under shrinkage. With a validation slice, training stops once
//! validation RMSE has not improved for `early_stopping_rounds` rounds and
//! the ensemble is truncated to the best iteration.
//!
//! The uncertainty estimate is the standard deviation of the staged
//! predictions over the last K boosting iterations. It is a computationally
//! cheap proxy for predictive variance, NOT a calibrated confidence
//! interval; treat it as a relative signal only.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::model::tree::{RegressionTree, TreeParams};
use crate::model::ColumnMatrix;

/// Default number of trailing iterations used for the uncertainty estimate.
pub const DEFAULT_UNCERTAINTY_WINDOW: usize = 50;

/// Boosting hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    /// Maximum boosting rounds.
    pub n_estimators: usize,
    /// Shrinkage applied to every tree's contribution.
    pub learning_rate: f64,
    /// Depth limit per tree.
    pub max_depth: usize,
    /// Minimum rows in a leaf.
    pub min_samples_leaf: usize,
    /// Row subsample fraction per tree.
    pub subsample: f64,
    /// Feature subsample fraction per tree.
    pub colsample_bytree: f64,
    /// L2 shrinkage on leaf values.
    pub reg_lambda: f64,
    /// Stop after this many rounds without validation improvement.
    pub early_stopping_rounds: usize,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.05,
            max_depth: 5,
            min_samples_leaf: 20,
            subsample: 0.8,
            colsample_bytree: 0.8,
            reg_lambda: 0.1,
            early_stopping_rounds: 10,
        }
    }
}

/// Errors from model fitting, prediction, and persistence.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("feature count mismatch: model has {expected}, input has {actual}")]
    FeatureMismatch { expected: usize, actual: usize },
    #[error("failed to read model '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write model '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to (de)serialize model '{path}': {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A fitted gradient-boosted ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmModel {
    base_prediction: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    feature_names: Vec<String>,
    /// Rounds actually in use after early stopping. Never decreases once set.
    best_iteration: usize,
}

impl GbmModel {
    /// Fit the ensemble.
    ///
    /// `validation` enables early stopping; without it every requested round
    /// is kept. All randomness (row and feature subsampling) is driven by
    /// `seed` — identical inputs and seed give an identical ensemble.
    pub fn fit(
        x: &ColumnMatrix,
        y: &[f64],
        validation: Option<(&ColumnMatrix, &[f64])>,
        feature_names: &[String],
        params: &GbmParams,
        seed: u64,
    ) -> Result<Self, ModelError> {
        let n = x.n_rows;
        if n == 0 || y.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        let n_features = x.n_features();

        let mut rng = StdRng::seed_from_u64(seed);

        let base_prediction = y.iter().sum::<f64>() / n as f64;
        let mut train_preds = vec![base_prediction; n];
        let mut residuals = vec![0.0; n];

        let mut val_preds: Vec<f64> =
            validation.map(|(vx, _)| vec![base_prediction; vx.n_rows]).unwrap_or_default();

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: 2 * params.min_samples_leaf,
            min_samples_leaf: params.min_samples_leaf,
            reg_lambda: params.reg_lambda,
        };

        let row_count = ((n as f64 * params.subsample).round() as usize).clamp(1, n);
        let feature_count =
            ((n_features as f64 * params.colsample_bytree).ceil() as usize).clamp(1, n_features);

        let mut trees: Vec<RegressionTree> = Vec::with_capacity(params.n_estimators);
        let mut best_iteration = 0usize;
        let mut best_rmse = f64::INFINITY;

        for round in 0..params.n_estimators {
            for i in 0..n {
                residuals[i] = y[i] - train_preds[i];
            }

            let mut rows = if row_count < n {
                sample(&mut rng, n, row_count).into_vec()
            } else {
                (0..n).collect()
            };
            rows.sort_unstable();

            let mut features = if feature_count < n_features {
                sample(&mut rng, n_features, feature_count).into_vec()
            } else {
                (0..n_features).collect()
            };
            features.sort_unstable();

            let tree = RegressionTree::fit(x, &residuals, &rows, &features, &tree_params);

            for i in 0..n {
                train_preds[i] += params.learning_rate * tree.predict_row(&x.row(i));
            }

            if let Some((vx, vy)) = validation {
                for (i, pred) in val_preds.iter_mut().enumerate() {
                    *pred += params.learning_rate * tree.predict_row(&vx.row(i));
                }
                let rmse = crate::metrics::rmse(vy, &val_preds);
                trees.push(tree);

                if rmse < best_rmse {
                    best_rmse = rmse;
                    best_iteration = round + 1;
                } else if round + 1 - best_iteration >= params.early_stopping_rounds {
                    break;
                }
            } else {
                trees.push(tree);
                best_iteration = round + 1;
            }
        }

        // Keep only the rounds that helped.
        trees.truncate(best_iteration);

        info!(
            rounds = best_iteration,
            features = feature_names.len(),
            "trained gradient-boosted model"
        );

        Ok(Self {
            base_prediction,
            learning_rate: params.learning_rate,
            trees,
            feature_names: feature_names.to_vec(),
            best_iteration,
        })
    }

    /// Rounds in use after early stopping.
    pub fn rounds_used(&self) -> usize {
        self.best_iteration
    }

    /// Ordered feature names the model was fit on.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn check_features(&self, x: &ColumnMatrix) -> Result<(), ModelError> {
        if x.n_features() != self.feature_names.len() {
            return Err(ModelError::FeatureMismatch {
                expected: self.feature_names.len(),
                actual: x.n_features(),
            });
        }
        Ok(())
    }

    /// Point predictions using the full (truncated) ensemble.
    pub fn predict(&self, x: &ColumnMatrix) -> Result<Vec<f64>, ModelError> {
        self.check_features(x)?;
        let mut preds = vec![self.base_prediction; x.n_rows];
        for tree in &self.trees {
            for (i, pred) in preds.iter_mut().enumerate() {
                *pred += self.learning_rate * tree.predict_row(&x.row(i));
            }
        }
        Ok(preds)
    }

    /// Predictions with the staged-uncertainty heuristic.
    ///
    /// Returns (yhat, yhat_std): the mean and standard deviation of the
    /// staged cumulative predictions at each of the last `window` boosting
    /// iterations (capped at the rounds used). A single-round model has zero
    /// spread.
    pub fn predict_with_std(
        &self,
        x: &ColumnMatrix,
        window: usize,
    ) -> Result<(Vec<f64>, Vec<f64>), ModelError> {
        self.check_features(x)?;
        let n = x.n_rows;
        let rounds = self.best_iteration;
        let window = window.min(rounds);
        let first_stage = (rounds.saturating_sub(window)).max(1);

        let mut running = vec![self.base_prediction; n];
        // Accumulate staged predictions from stage `first_stage` onward.
        let mut staged: Vec<Vec<f64>> = Vec::with_capacity(rounds.saturating_sub(first_stage) + 1);
        for (t, tree) in self.trees.iter().enumerate() {
            for (i, pred) in running.iter_mut().enumerate() {
                *pred += self.learning_rate * tree.predict_row(&x.row(i));
            }
            if t + 1 >= first_stage {
                staged.push(running.clone());
            }
        }
        if staged.is_empty() {
            // No trees at all: fall back to the base prediction with no spread.
            return Ok((vec![self.base_prediction; n], vec![0.0; n]));
        }

        let k = staged.len() as f64;
        let mut yhat = vec![0.0; n];
        let mut yhat_std = vec![0.0; n];
        for i in 0..n {
            let mean = staged.iter().map(|s| s[i]).sum::<f64>() / k;
            let var = staged.iter().map(|s| (s[i] - mean) * (s[i] - mean)).sum::<f64>() / k;
            yhat[i] = mean;
            yhat_std[i] = var.sqrt();
        }
        Ok((yhat, yhat_std))
    }

    /// Gain-based feature importance, descending.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut totals = vec![0.0; self.feature_names.len()];
        for tree in &self.trees {
            for (f, g) in tree.feature_gains().iter().enumerate() {
                totals[f] += g;
            }
        }
        let mut pairs: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(totals)
            .collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).expect("gains are finite"));
        pairs
    }

    /// Persist as JSON.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_string(self).map_err(|source| ModelError::Serde {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ModelError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "saved model");
        Ok(())
    }

    /// Load a model persisted by [`GbmModel::save`].
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ModelError::Serde {
            path: path.to_path_buf(),
            source,
        })
    }
}
