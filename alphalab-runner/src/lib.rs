//! AlphaLab Runner — the validation/training half of the pipeline.
//!
//! - `timesplit` — expanding-window, embargoed cross-validation splits
//! - `model` — gradient-boosted regression trees with early stopping and a
//!   staged-prediction uncertainty heuristic
//! - `metrics` — pure regression metric functions
//! - `train` — walk-forward training orchestration and artifact export
//! - `inference` — applying a persisted model to the latest feature rows
//! - `data_loader` — CSV ingestion with schema validation
//! - `pipeline` — the feature/label entry points exposed to collaborators

pub mod artifacts;
pub mod data_loader;
pub mod inference;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod timesplit;
pub mod train;

pub use pipeline::{compute_features, compute_labels};
pub use train::{train_with_cv, TrainReport, TrainRequest};
