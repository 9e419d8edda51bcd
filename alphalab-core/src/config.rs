//! Pipeline configuration — explicit, immutable, passed into every stage.
//!
//! Loaded once from TOML at the entry point and handed down by value; no
//! stage reads ambient global state. Malformed composite weights fall back
//! to the documented equal split instead of failing the load.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::CompositeWeights;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("sector map '{path}' is missing required column '{column}'")]
    SectorMapMissingColumn { path: PathBuf, column: String },
    #[error("failed to read sector map '{path}': {source}")]
    SectorMapRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// All knobs a pipeline run honors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ticker universe used when the caller does not name symbols.
    pub tickers: Vec<String>,
    /// Price history fetched before the requested start so long indicators
    /// have a warm-up runway.
    pub feature_lookback_days: i64,
    /// Maximum age of a fundamentals snapshot before it stops applying.
    pub fundamentals_staleness_days: i64,
    /// Columns above this missing rate are dropped by the cleaner.
    pub nan_drop_threshold: f64,
    /// Blend weights for the composite score.
    pub composite_weights: CompositeWeights,
    /// Optional CSV mapping symbol → sector for relative valuation.
    pub sector_map_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tickers: Vec::new(),
            feature_lookback_days: 400,
            fundamentals_staleness_days: 120,
            nan_drop_threshold: 0.8,
            composite_weights: CompositeWeights::default(),
            sector_map_path: None,
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file.
    ///
    /// The composite-weights table is parsed leniently: an unparseable shape
    /// degrades to the equal split rather than rejecting the whole file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // Stage one: structure without the weights table.
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct RawConfig {
            tickers: Vec<String>,
            feature_lookback_days: Option<i64>,
            fundamentals_staleness_days: Option<i64>,
            nan_drop_threshold: Option<f64>,
            composite_weights: Option<toml::Value>,
            sector_map_path: Option<PathBuf>,
        }

        let raw: RawConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let defaults = Self::default();
        Ok(Self {
            tickers: raw.tickers,
            feature_lookback_days: raw
                .feature_lookback_days
                .unwrap_or(defaults.feature_lookback_days),
            fundamentals_staleness_days: raw
                .fundamentals_staleness_days
                .unwrap_or(defaults.fundamentals_staleness_days),
            nan_drop_threshold: raw
                .nan_drop_threshold
                .unwrap_or(defaults.nan_drop_threshold),
            composite_weights: raw
                .composite_weights
                .map(CompositeWeights::from_toml)
                .unwrap_or_default()
                .sanitized(),
            sector_map_path: raw.sector_map_path,
        })
    }

    /// Load the sector map named by `sector_map_path`, if any.
    pub fn load_sector_map(&self) -> Result<Option<HashMap<String, String>>, ConfigError> {
        match &self.sector_map_path {
            Some(path) => load_sector_map(path).map(Some),
            None => Ok(None),
        }
    }
}

/// Read a symbol → sector CSV with required columns `symbol` and `sector`.
pub fn load_sector_map(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| ConfigError::SectorMapRead {
        path: path.to_path_buf(),
        source,
    })?;

    let headers = reader
        .headers()
        .map_err(|source| ConfigError::SectorMapRead {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let col = |name: &str| -> Result<usize, ConfigError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ConfigError::SectorMapMissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let symbol_idx = col("symbol")?;
    let sector_idx = col("sector")?;

    let mut map = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|source| ConfigError::SectorMapRead {
            path: path.to_path_buf(),
            source,
        })?;
        if let (Some(symbol), Some(sector)) = (record.get(symbol_idx), record.get(sector_idx)) {
            map.insert(symbol.trim().to_string(), sector.trim().to_string());
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documentation() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.feature_lookback_days, 400);
        assert_eq!(cfg.fundamentals_staleness_days, 120);
        assert!((cfg.nan_drop_threshold - 0.8).abs() < 1e-12);
        assert!(cfg.sector_map_path.is_none());
    }

    #[test]
    fn load_partial_toml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "tickers = [\"TCS\", \"INFY\"]\nfundamentals_staleness_days = 90"
        )
        .unwrap();

        let cfg = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(cfg.tickers, vec!["TCS", "INFY"]);
        assert_eq!(cfg.fundamentals_staleness_days, 90);
        assert_eq!(cfg.feature_lookback_days, 400);
        assert_eq!(cfg.composite_weights, CompositeWeights::default());
    }

    #[test]
    fn malformed_weights_degrade_to_equal_split() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "tickers = [\"TCS\"]\n[composite_weights]\nquality = \"heavy\""
        )
        .unwrap();

        let cfg = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(cfg.composite_weights, CompositeWeights::equal_split());
    }

    #[test]
    fn sector_map_requires_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "symbol,industry\nTCS,IT").unwrap();

        let err = load_sector_map(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::SectorMapMissingColumn { .. }));
    }

    #[test]
    fn sector_map_parses() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "symbol,sector\nTCS,IT\nSUNPHARMA,PHARMA").unwrap();

        let map = load_sector_map(file.path()).unwrap();
        assert_eq!(map.get("TCS").map(String::as_str), Some("IT"));
        assert_eq!(map.get("SUNPHARMA").map(String::as_str), Some("PHARMA"));
    }
}
