//! Training orchestration — walk-forward cross-validation over the labeled
//! feature table.
//!
//! Per fold: the fold's training rows are split into a fit slice and a
//! time-ordered early-stopping validation slice (the last 20% — never a
//! random subset, which would leak future rows into the stopping decision),
//! a model is fit, and the held-out test rows are scored. Metrics are
//! aggregated as mean/std across folds and gain importances are averaged.
//! The final fold's model plus the metrics document and importance table are
//! persisted as artifacts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use alphalab_core::store::FeatureStore;

use crate::artifacts::{save_train_artifacts, ArtifactError};
use crate::metrics::RegressionMetrics;
use crate::model::{feature_columns, matrix_from_feature_rows, GbmModel, GbmParams, ModelError};
use crate::timesplit::{expanding_window_split, SplitConfig, SplitError};

/// Rows must carry at least this many finite features to enter training or
/// inference.
pub const MIN_FEATURE_COUNT: usize = 10;

/// Fraction of each fold's training rows held out (from the end) for early
/// stopping.
const VALIDATION_FRACTION: f64 = 0.2;

/// Everything a training run needs, serializable so the run id can be a
/// content hash and the configuration can be echoed into the metrics
/// artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainRequest {
    /// Instruments to train on; None means every labeled instrument.
    pub symbols: Option<Vec<String>>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub n_splits: usize,
    pub embargo_days: i64,
    pub test_size: f64,
    pub model_params: GbmParams,
    /// Drives fold assignment bookkeeping and all model randomness.
    pub seed: u64,
    /// Directory receiving metrics.json, feature_importances.csv, model.json.
    pub output_dir: PathBuf,
}

impl Default for TrainRequest {
    fn default() -> Self {
        Self {
            symbols: None,
            start: None,
            end: None,
            n_splits: 5,
            embargo_days: 2,
            test_size: 0.2,
            model_params: GbmParams::default(),
            seed: 42,
            output_dir: PathBuf::from("artifacts/models"),
        }
    }
}

impl TrainRequest {
    /// Deterministic content-hash identity for this run.
    pub fn run_id(&self) -> String {
        let json = serde_json::to_string(self).expect("TrainRequest serialization");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

/// One fold's evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldReport {
    pub fold: usize,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    pub n_train: usize,
    pub n_test: usize,
    pub metrics: RegressionMetrics,
}

/// Mean/std of every metric across folds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub rmse_mean: f64,
    pub rmse_std: f64,
    pub mae_mean: f64,
    pub mae_std: f64,
    pub r2_mean: f64,
    pub r2_std: f64,
    pub direction_accuracy_mean: f64,
    pub direction_accuracy_std: f64,
    pub n_folds: usize,
    pub n_total_samples: usize,
}

/// One row of the averaged importance table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Full result of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub run_id: String,
    pub overall: AggregateMetrics,
    pub folds: Vec<FoldReport>,
    /// Gain importances averaged across folds, descending.
    pub feature_importances: Vec<FeatureImportance>,
    pub request: TrainRequest,
}

/// Errors from a training run.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("no labeled feature rows matched the request")]
    NoTrainingData,
    #[error("split generation failed: {0}")]
    Split(#[from] SplitError),
    #[error("model fit failed on fold {fold}: {source}")]
    Model {
        fold: usize,
        #[source]
        source: ModelError,
    },
    #[error("artifact export failed: {0}")]
    Artifact(#[from] ArtifactError),
}

/// Run walk-forward cross-validated training and persist the artifacts.
pub fn train_with_cv(
    store: &dyn FeatureStore,
    request: &TrainRequest,
) -> Result<TrainReport, TrainError> {
    let mut rows = store.labeled_rows(request.symbols.as_deref(), request.start, request.end);
    rows.retain(|r| r.feature_count() >= MIN_FEATURE_COUNT);
    if rows.is_empty() {
        return Err(TrainError::NoTrainingData);
    }

    // Time-series CV needs date order; symbol breaks ties deterministically.
    rows.sort_by(|a, b| (a.date, a.symbol.as_str()).cmp(&(b.date, b.symbol.as_str())));
    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();

    let columns = feature_columns(&rows);
    info!(
        rows = rows.len(),
        features = columns.len(),
        "loaded labeled feature rows"
    );

    let split_config = SplitConfig {
        n_splits: request.n_splits,
        embargo_days: request.embargo_days,
        test_size: request.test_size,
        seed: request.seed,
    };
    let splits = expanding_window_split(&dates, &split_config)?;
    info!(
        folds = splits.len(),
        requested = request.n_splits,
        embargo_days = request.embargo_days,
        "generated cross-validation folds"
    );

    let x_full = matrix_from_feature_rows(&rows, &columns);
    let labels: Vec<f64> = rows
        .iter()
        .map(|r| r.label.expect("labeled_rows returns labeled rows"))
        .collect();

    let mut folds = Vec::with_capacity(splits.len());
    let mut importance_sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    let mut final_model: Option<GbmModel> = None;

    for split in &splits {
        let fold = split.fold_index;

        let train_x = x_full.gather(&split.train);
        let train_y: Vec<f64> = split.train.iter().map(|&i| labels[i]).collect();
        let test_x = x_full.gather(&split.test);
        let test_y: Vec<f64> = split.test.iter().map(|&i| labels[i]).collect();

        // Early-stopping slice: the last 20% of training rows in time order.
        let val_size = (train_y.len() as f64 * VALIDATION_FRACTION) as usize;
        let fit_size = train_y.len() - val_size;

        let model = if val_size > 0 {
            let fit_rows: Vec<usize> = (0..fit_size).collect();
            let val_rows: Vec<usize> = (fit_size..train_y.len()).collect();
            let fit_x = train_x.gather(&fit_rows);
            let val_x = train_x.gather(&val_rows);
            GbmModel::fit(
                &fit_x,
                &train_y[..fit_size],
                Some((&val_x, &train_y[fit_size..])),
                &columns,
                &request.model_params,
                request.seed,
            )
        } else {
            GbmModel::fit(
                &train_x,
                &train_y,
                None,
                &columns,
                &request.model_params,
                request.seed,
            )
        }
        .map_err(|source| TrainError::Model { fold, source })?;

        let preds = model
            .predict(&test_x)
            .map_err(|source| TrainError::Model { fold, source })?;
        let metrics = RegressionMetrics::compute(&test_y, &preds);

        info!(
            fold,
            rmse = metrics.rmse,
            mae = metrics.mae,
            r2 = metrics.r2,
            direction_accuracy = metrics.direction_accuracy,
            n_train = split.train.len(),
            n_test = split.test.len(),
            "evaluated fold"
        );

        for (feature, gain) in model.feature_importance() {
            let entry = importance_sums.entry(feature).or_insert((0.0, 0));
            entry.0 += gain;
            entry.1 += 1;
        }

        folds.push(FoldReport {
            fold,
            train_start: dates[*split.train.first().expect("non-empty train")],
            train_end: dates[*split.train.last().expect("non-empty train")],
            test_start: dates[*split.test.first().expect("non-empty test")],
            test_end: dates[*split.test.last().expect("non-empty test")],
            n_train: split.train.len(),
            n_test: split.test.len(),
            metrics,
        });

        final_model = Some(model);
    }

    let overall = aggregate(&folds, rows.len());

    let mut feature_importances: Vec<FeatureImportance> = importance_sums
        .into_iter()
        .map(|(feature, (sum, count))| FeatureImportance {
            feature,
            importance: sum / count as f64,
        })
        .collect();
    feature_importances
        .sort_by(|a, b| b.importance.partial_cmp(&a.importance).expect("finite gains"));

    let report = TrainReport {
        run_id: request.run_id(),
        overall,
        folds,
        feature_importances,
        request: request.clone(),
    };

    match &final_model {
        Some(model) => save_train_artifacts(&report, model, &request.output_dir)?,
        None => warn!("no fold produced a model; skipping artifact export"),
    }

    info!(
        rmse_mean = report.overall.rmse_mean,
        direction_accuracy_mean = report.overall.direction_accuracy_mean,
        n_folds = report.overall.n_folds,
        "training run complete"
    );

    Ok(report)
}

fn aggregate(folds: &[FoldReport], n_total_samples: usize) -> AggregateMetrics {
    let (rmse_mean, rmse_std) = mean_std(folds.iter().map(|f| f.metrics.rmse));
    let (mae_mean, mae_std) = mean_std(folds.iter().map(|f| f.metrics.mae));
    let (r2_mean, r2_std) = mean_std(folds.iter().map(|f| f.metrics.r2));
    let (dir_mean, dir_std) = mean_std(folds.iter().map(|f| f.metrics.direction_accuracy));

    AggregateMetrics {
        rmse_mean,
        rmse_std,
        mae_mean,
        mae_std,
        r2_mean,
        r2_std,
        direction_accuracy_mean: dir_mean,
        direction_accuracy_std: dir_std,
        n_folds: folds.len(),
        n_total_samples,
    }
}

/// Mean and population standard deviation.
fn mean_std(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_deterministic_and_seed_sensitive() {
        let a = TrainRequest::default();
        let b = TrainRequest::default();
        assert_eq!(a.run_id(), b.run_id());

        let c = TrainRequest {
            seed: 7,
            ..TrainRequest::default()
        };
        assert_ne!(a.run_id(), c.run_id());
    }

    #[test]
    fn mean_std_known_values() {
        let (mean, std) = mean_std([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter());
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_store_is_an_error() {
        let store = alphalab_core::store::InMemoryStore::new();
        let request = TrainRequest {
            output_dir: std::env::temp_dir().join("alphalab-test-never-written"),
            ..TrainRequest::default()
        };
        let err = train_with_cv(&store, &request).unwrap_err();
        assert!(matches!(err, TrainError::NoTrainingData));
    }
}
