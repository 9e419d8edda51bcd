//! Inference — apply a persisted model to the latest feature rows.
//!
//! Rows are aligned to the model's feature-name list (absent columns become
//! 0.0, the training-time fill), predicted with the staged-uncertainty
//! heuristic, and squashed into an up-probability:
//! `prob_up = sigmoid(yhat / max(yhat_std, 1e-6))`, clipped to [0.01, 0.99].
//! The sigmoid is an approximation of the normal CDF, not an exact one, and
//! the result inherits the uncertainty heuristic's limitations.

use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use alphalab_core::domain::Prediction;
use alphalab_core::frame::FeatureRow;
use alphalab_core::store::{FeatureStore, PredictionStore};

use crate::model::{
    matrix_from_feature_rows, GbmModel, ModelError, DEFAULT_UNCERTAINTY_WINDOW,
};
use crate::train::MIN_FEATURE_COUNT;

/// Floor for the uncertainty in the probability squash.
const STD_FLOOR: f64 = 1e-6;

/// Errors from the inference pipeline.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

/// Predictions for a batch of feature rows.
pub fn generate_predictions(
    model: &GbmModel,
    rows: &[FeatureRow],
    horizon_days: u32,
) -> Result<Vec<Prediction>, InferenceError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let x = matrix_from_feature_rows(rows, model.feature_names());
    let (yhat, yhat_std) = model.predict_with_std(&x, DEFAULT_UNCERTAINTY_WINDOW)?;

    let predictions = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let z = yhat[i] / yhat_std[i].max(STD_FLOOR);
            let prob_up = (1.0 / (1.0 + (-z).exp())).clamp(0.01, 0.99);
            Prediction {
                symbol: row.symbol.clone(),
                date: row.date,
                horizon_days,
                yhat: yhat[i],
                yhat_std: yhat_std[i],
                prob_up,
            }
        })
        .collect();

    Ok(predictions)
}

/// Load a model, predict for every qualifying feature row on `date`, and
/// upsert the predictions. Returns the number upserted.
pub fn run_inference<S: FeatureStore + PredictionStore>(
    model_path: &Path,
    store: &mut S,
    symbols: Option<&[String]>,
    date: NaiveDate,
    horizon_days: u32,
) -> Result<usize, InferenceError> {
    info!(path = %model_path.display(), "loading model");
    let model = GbmModel::load(model_path)?;

    let mut rows = store.rows_for_date(symbols, date);
    rows.retain(|r| r.feature_count() >= MIN_FEATURE_COUNT);

    if rows.is_empty() {
        warn!(%date, "no feature rows qualify for inference");
        return Ok(0);
    }

    info!(rows = rows.len(), %date, horizon_days, "generating predictions");
    let predictions = generate_predictions(&model, &rows, horizon_days)?;
    let upserted = store.upsert_predictions(predictions);

    info!(upserted, "inference complete");
    Ok(upserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnMatrix, GbmParams};
    use std::collections::BTreeMap;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn fitted_model() -> GbmModel {
        // y = x0 on 100 rows.
        let n = 100;
        let mut x = ColumnMatrix::new(n, 2);
        let mut y = vec![0.0; n];
        for i in 0..n {
            let v = i as f64 / n as f64 - 0.5;
            x.columns[0][i] = v;
            x.columns[1][i] = (i % 7) as f64;
            y[i] = v;
        }
        let params = GbmParams {
            n_estimators: 30,
            min_samples_leaf: 5,
            ..GbmParams::default()
        };
        GbmModel::fit(
            &x,
            &y,
            None,
            &["alpha".to_string(), "beta".to_string()],
            &params,
            1,
        )
        .unwrap()
    }

    fn feature_row(symbol: &str, alpha: f64) -> FeatureRow {
        let mut values = BTreeMap::new();
        values.insert("alpha".to_string(), alpha);
        values.insert("beta".to_string(), 3.0);
        FeatureRow {
            symbol: symbol.to_string(),
            date: d(1),
            values,
            label: None,
        }
    }

    #[test]
    fn probabilities_are_clipped_and_signed() {
        let model = fitted_model();
        let rows = vec![feature_row("UP", 0.4), feature_row("DOWN", -0.4)];

        let preds = generate_predictions(&model, &rows, 1).unwrap();
        assert_eq!(preds.len(), 2);

        let up = preds.iter().find(|p| p.symbol == "UP").unwrap();
        let down = preds.iter().find(|p| p.symbol == "DOWN").unwrap();

        assert!(up.yhat > 0.0);
        assert!(down.yhat < 0.0);
        assert!(up.prob_up > 0.5);
        assert!(down.prob_up < 0.5);
        for p in &preds {
            assert!((0.01..=0.99).contains(&p.prob_up));
            assert!(p.yhat_std >= 0.0);
        }
    }

    #[test]
    fn missing_feature_column_defaults_to_zero() {
        let model = fitted_model();
        let mut row = feature_row("PARTIAL", 0.3);
        row.values.remove("beta");

        let preds = generate_predictions(&model, &[row], 1).unwrap();
        assert_eq!(preds.len(), 1);
        assert!(preds[0].yhat.is_finite());
    }

    #[test]
    fn empty_rows_give_empty_predictions() {
        let model = fitted_model();
        let preds = generate_predictions(&model, &[], 1).unwrap();
        assert!(preds.is_empty());
    }
}
