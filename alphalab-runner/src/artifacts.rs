//! Artifact export — the persisted outputs of a training run.
//!
//! Three files per run directory:
//! - `metrics.json` — the full [`TrainReport`] (per-fold and aggregate
//!   metrics plus the request that produced them), pretty-printed
//! - `feature_importances.csv` — fold-averaged gain importances, descending
//! - `model.json` — the final fold's ensemble, loadable for inference

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::model::{GbmModel, ModelError};
use crate::train::{FeatureImportance, TrainReport};

/// Errors from artifact export.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to create artifact directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write artifact '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize metrics: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to build importance csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to persist model: {0}")]
    Model(#[from] ModelError),
}

/// Serialize the report to pretty JSON.
pub fn export_metrics_json(report: &TrainReport) -> Result<String, ArtifactError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Render the importance table as CSV with a `feature,importance` header.
pub fn export_importances_csv(
    importances: &[FeatureImportance],
) -> Result<String, ArtifactError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["feature", "importance"])?;
    for row in importances {
        wtr.write_record([row.feature.as_str(), &format!("{:.6}", row.importance)])?;
    }
    let bytes = wtr.into_inner().expect("vec writer never fails to flush");
    Ok(String::from_utf8(bytes).expect("csv output is utf-8"))
}

/// Write all three artifacts into `dir`, creating it if needed.
pub fn save_train_artifacts(
    report: &TrainReport,
    model: &GbmModel,
    dir: &Path,
) -> Result<(), ArtifactError> {
    std::fs::create_dir_all(dir).map_err(|source| ArtifactError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let write = |name: &str, content: &str| -> Result<(), ArtifactError> {
        let path = dir.join(name);
        std::fs::write(&path, content).map_err(|source| ArtifactError::Write { path, source })
    };

    write("metrics.json", &export_metrics_json(report)?)?;
    write(
        "feature_importances.csv",
        &export_importances_csv(&report.feature_importances)?,
    )?;
    model.save(&dir.join("model.json"))?;

    info!(dir = %dir.display(), "saved training artifacts");
    Ok(())
}
