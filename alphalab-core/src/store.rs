//! Feature and prediction store seams.
//!
//! The pipeline writes through these traits; the real persistence engine is
//! a collaborator. The contracts that matter here:
//! - feature upserts are idempotent on (symbol, date) — re-running a range
//!   refreshes values and never duplicates rows;
//! - labels only update rows that already exist, never create them;
//! - prediction upserts are idempotent on (symbol, date, horizon).
//!
//! `InMemoryStore` implements both traits for tests and offline runs, with a
//! JSON snapshot so CLI invocations can chain.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::Prediction;
use crate::frame::FeatureRow;
use crate::labeling::Label;

/// Result of a label attach pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelAttachment {
    /// Rows whose label was set or refreshed.
    pub updated: usize,
    /// Labels with no matching feature row, dropped.
    pub dropped: usize,
}

/// Write/read access to the feature table.
pub trait FeatureStore {
    /// Idempotent upsert keyed by (symbol, date). Returns rows written.
    fn upsert_features(&mut self, rows: Vec<FeatureRow>) -> usize;

    /// Attach labels to existing rows only; missing rows are counted as
    /// dropped, never created.
    fn attach_labels(&mut self, labels: &[Label]) -> LabelAttachment;

    /// Rows carrying a label, optionally filtered by symbols and date range.
    fn labeled_rows(
        &self,
        symbols: Option<&[String]>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Vec<FeatureRow>;

    /// All rows for one date, optionally filtered by symbols.
    fn rows_for_date(&self, symbols: Option<&[String]>, date: NaiveDate) -> Vec<FeatureRow>;

    /// Total row count.
    fn row_count(&self) -> usize;
}

/// Write access to the predictions table.
pub trait PredictionStore {
    /// Idempotent upsert keyed by (symbol, date, horizon). Returns rows written.
    fn upsert_predictions(&mut self, predictions: Vec<Prediction>) -> usize;
}

/// Errors from store snapshot persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read store snapshot '{path}': {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write store snapshot '{path}': {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to (de)serialize store snapshot '{path}': {source}")]
    Serde {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory store keyed by BTreeMaps, giving deterministic iteration and
/// idempotent upserts by construction.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    features: BTreeMap<(String, NaiveDate), FeatureRow>,
    predictions: BTreeMap<(String, NaiveDate, u32), Prediction>,
}

/// Flat snapshot form: JSON maps need string keys, so the snapshot stores
/// plain row lists and the maps are rebuilt on load.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    features: Vec<FeatureRow>,
    predictions: Vec<Prediction>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`InMemoryStore::save`].
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&text).map_err(|source| StoreError::Serde {
                path: path.to_path_buf(),
                source,
            })?;

        let mut store = Self::new();
        for row in snapshot.features {
            store.features.insert((row.symbol.clone(), row.date), row);
        }
        for pred in snapshot.predictions {
            store
                .predictions
                .insert((pred.symbol.clone(), pred.date, pred.horizon_days), pred);
        }
        Ok(store)
    }

    /// Write a JSON snapshot so a later process can pick up where this one
    /// left off.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            features: self.features.values().cloned().collect(),
            predictions: self.predictions.values().cloned().collect(),
        };
        let json = serde_json::to_string(&snapshot).map_err(|source| StoreError::Serde {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn prediction(&self, symbol: &str, date: NaiveDate, horizon_days: u32) -> Option<&Prediction> {
        self.predictions
            .get(&(symbol.to_string(), date, horizon_days))
    }

    pub fn prediction_count(&self) -> usize {
        self.predictions.len()
    }

    pub fn feature_row(&self, symbol: &str, date: NaiveDate) -> Option<&FeatureRow> {
        self.features.get(&(symbol.to_string(), date))
    }

    fn row_matches(
        row: &FeatureRow,
        symbols: Option<&[String]>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> bool {
        if let Some(symbols) = symbols {
            if !symbols.contains(&row.symbol) {
                return false;
            }
        }
        if let Some(start) = start {
            if row.date < start {
                return false;
            }
        }
        if let Some(end) = end {
            if row.date > end {
                return false;
            }
        }
        true
    }
}

impl FeatureStore for InMemoryStore {
    fn upsert_features(&mut self, rows: Vec<FeatureRow>) -> usize {
        let written = rows.len();
        for row in rows {
            let key = (row.symbol.clone(), row.date);
            // Refresh values; preserve an existing label the new row lacks
            // (feature recomputation must not erase labeling work).
            let label = row
                .label
                .or_else(|| self.features.get(&key).and_then(|r| r.label));
            let mut row = row;
            row.label = label;
            self.features.insert(key, row);
        }
        written
    }

    fn attach_labels(&mut self, labels: &[Label]) -> LabelAttachment {
        let mut outcome = LabelAttachment::default();
        for label in labels {
            match self
                .features
                .get_mut(&(label.symbol.clone(), label.date))
            {
                Some(row) => {
                    row.label = Some(label.value);
                    outcome.updated += 1;
                }
                None => outcome.dropped += 1,
            }
        }
        if outcome.dropped > 0 {
            info!(
                dropped = outcome.dropped,
                "labels without a matching feature row were dropped"
            );
        }
        outcome
    }

    fn labeled_rows(
        &self,
        symbols: Option<&[String]>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Vec<FeatureRow> {
        self.features
            .values()
            .filter(|r| r.label.is_some() && Self::row_matches(r, symbols, start, end))
            .cloned()
            .collect()
    }

    fn rows_for_date(&self, symbols: Option<&[String]>, date: NaiveDate) -> Vec<FeatureRow> {
        self.features
            .values()
            .filter(|r| r.date == date && Self::row_matches(r, symbols, None, None))
            .cloned()
            .collect()
    }

    fn row_count(&self) -> usize {
        self.features.len()
    }
}

impl PredictionStore for InMemoryStore {
    fn upsert_predictions(&mut self, predictions: Vec<Prediction>) -> usize {
        let written = predictions.len();
        for pred in predictions {
            self.predictions
                .insert((pred.symbol.clone(), pred.date, pred.horizon_days), pred);
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn row(symbol: &str, day: u32, value: f64) -> FeatureRow {
        let mut values = Map::new();
        values.insert("rsi_14".to_string(), value);
        FeatureRow {
            symbol: symbol.to_string(),
            date: d(day),
            values,
            label: None,
        }
    }

    fn label(symbol: &str, day: u32, value: f64) -> Label {
        Label {
            symbol: symbol.to_string(),
            date: d(day),
            horizon_days: 1,
            value,
        }
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut store = InMemoryStore::new();
        store.upsert_features(vec![row("A", 1, 50.0), row("A", 2, 51.0)]);
        assert_eq!(store.row_count(), 2);

        // Second pass over the same keys: same count, refreshed values.
        store.upsert_features(vec![row("A", 1, 60.0), row("A", 2, 61.0)]);
        assert_eq!(store.row_count(), 2);
        assert_eq!(
            store.feature_row("A", d(1)).unwrap().values["rsi_14"],
            60.0
        );
    }

    #[test]
    fn upsert_preserves_existing_label() {
        let mut store = InMemoryStore::new();
        store.upsert_features(vec![row("A", 1, 50.0)]);
        store.attach_labels(&[label("A", 1, 0.02)]);

        store.upsert_features(vec![row("A", 1, 55.0)]);
        let stored = store.feature_row("A", d(1)).unwrap();
        assert_eq!(stored.values["rsi_14"], 55.0);
        assert_eq!(stored.label, Some(0.02));
    }

    #[test]
    fn labels_never_create_rows() {
        let mut store = InMemoryStore::new();
        store.upsert_features(vec![row("A", 1, 50.0)]);

        let outcome = store.attach_labels(&[label("A", 1, 0.01), label("A", 9, 0.03)]);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(store.row_count(), 1);
        assert!(store.feature_row("A", d(9)).is_none());
    }

    #[test]
    fn labeled_rows_filters() {
        let mut store = InMemoryStore::new();
        store.upsert_features(vec![row("A", 1, 1.0), row("A", 2, 2.0), row("B", 1, 3.0)]);
        store.attach_labels(&[label("A", 1, 0.1), label("B", 1, 0.2)]);

        let all = store.labeled_rows(None, None, None);
        assert_eq!(all.len(), 2);

        let only_a = store.labeled_rows(Some(&["A".to_string()]), None, None);
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].symbol, "A");

        let from_day2 = store.labeled_rows(None, Some(d(2)), None);
        assert!(from_day2.is_empty());
    }

    #[test]
    fn prediction_upsert_is_idempotent_per_horizon() {
        let mut store = InMemoryStore::new();
        let pred = |h: u32, yhat: f64| Prediction {
            symbol: "A".to_string(),
            date: d(1),
            horizon_days: h,
            yhat,
            yhat_std: 0.01,
            prob_up: 0.6,
        };

        store.upsert_predictions(vec![pred(1, 0.01), pred(5, 0.05)]);
        assert_eq!(store.prediction_count(), 2);

        store.upsert_predictions(vec![pred(1, 0.02)]);
        assert_eq!(store.prediction_count(), 2);
        assert_eq!(store.prediction("A", d(1), 1).unwrap().yhat, 0.02);
        assert_eq!(store.prediction("A", d(1), 5).unwrap().yhat, 0.05);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut store = InMemoryStore::new();
        store.upsert_features(vec![row("A", 1, 42.0)]);
        store.attach_labels(&[label("A", 1, 0.01)]);

        let file = tempfile::NamedTempFile::new().unwrap();
        store.save(file.path()).unwrap();
        let loaded = InMemoryStore::load(file.path()).unwrap();

        assert_eq!(loaded.row_count(), 1);
        assert_eq!(loaded.feature_row("A", d(1)).unwrap().label, Some(0.01));
    }
}
