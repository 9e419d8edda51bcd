//! FeatureFrame — column-oriented feature table keyed by (symbol, date).
//!
//! Rows are sorted by (symbol, date) and unique, so each symbol occupies one
//! contiguous index range; per-instrument stages iterate those ranges instead
//! of re-deriving global indices, and cross-sectional stages group row
//! indices by date. Columns are named `Vec<f64>` series where `f64::NAN`
//! means missing. The schema is open: stages add columns by name and
//! consumers tolerate absence.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

/// Column-oriented table of named numeric features over (symbol, date) rows.
#[derive(Debug, Clone, Default)]
pub struct FeatureFrame {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    series: HashMap<String, Vec<f64>>,
    /// Forward-return labels, NaN where unlabeled. Not a feature column.
    labels: Vec<f64>,
}

/// Row-major persisted form of one feature row.
///
/// Non-finite values are dropped from the map on conversion: an absent key
/// is the persisted representation of "missing".
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FeatureRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub values: BTreeMap<String, f64>,
    pub label: Option<f64>,
}

impl FeatureRow {
    /// Number of finite feature values in the row.
    pub fn feature_count(&self) -> usize {
        self.values.len()
    }
}

impl FeatureFrame {
    /// Build an empty frame over the given keys, sorted and deduplicated.
    pub fn from_keys(mut keys: Vec<(String, NaiveDate)>) -> Self {
        keys.sort();
        keys.dedup();
        let n = keys.len();
        let (symbols, dates) = keys.into_iter().unzip();
        Self {
            symbols,
            dates,
            columns: Vec::new(),
            series: HashMap::new(),
            labels: vec![f64::NAN; n],
        }
    }

    /// A new frame with the same keys and no columns.
    pub fn keys_like(&self) -> Self {
        Self {
            symbols: self.symbols.clone(),
            dates: self.dates.clone(),
            columns: Vec::new(),
            series: HashMap::new(),
            labels: vec![f64::NAN; self.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol(&self, row: usize) -> &str {
        &self.symbols[row]
    }

    pub fn date(&self, row: usize) -> NaiveDate {
        self.dates[row]
    }

    /// Column names in insertion order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// Insert or replace a column. The series length must match the row count.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<f64>) {
        let name = name.into();
        assert_eq!(
            values.len(),
            self.len(),
            "column '{name}' length {} != row count {}",
            values.len(),
            self.len()
        );
        if !self.series.contains_key(&name) {
            self.columns.push(name.clone());
        }
        self.series.insert(name, values);
    }

    /// Ensure a column exists, creating it as all-NaN if absent.
    pub fn ensure_column(&mut self, name: &str) {
        if !self.series.contains_key(name) {
            self.set_column(name.to_string(), vec![f64::NAN; self.len()]);
        }
    }

    /// Remove a column. No-op when absent.
    pub fn drop_column(&mut self, name: &str) {
        if self.series.remove(name).is_some() {
            self.columns.retain(|c| c != name);
        }
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut [f64]> {
        self.series.get_mut(name).map(|v| v.as_mut_slice())
    }

    /// Value at (column, row); NaN when the column is absent.
    pub fn value(&self, name: &str, row: usize) -> f64 {
        self.series
            .get(name)
            .map(|v| v[row])
            .unwrap_or(f64::NAN)
    }

    /// Fraction of NaN values in a column; 1.0 for an absent column.
    pub fn missing_rate(&self, name: &str) -> f64 {
        match self.series.get(name) {
            Some(v) if !v.is_empty() => {
                v.iter().filter(|x| x.is_nan()).count() as f64 / v.len() as f64
            }
            _ => 1.0,
        }
    }

    /// Row index of (symbol, date), if present. Binary search over the
    /// (symbol, date) sort order.
    pub fn row_index(&self, symbol: &str, date: NaiveDate) -> Option<usize> {
        let mut lo = 0usize;
        let mut hi = self.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let key = (self.symbols[mid].as_str(), self.dates[mid]);
            match key.cmp(&(symbol, date)) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Some(mid),
            }
        }
        None
    }

    /// Contiguous row range per symbol, in symbol order.
    pub fn symbol_ranges(&self) -> Vec<(String, Range<usize>)> {
        let mut ranges = Vec::new();
        let n = self.len();
        let mut start = 0usize;
        while start < n {
            let sym = &self.symbols[start];
            let mut end = start + 1;
            while end < n && &self.symbols[end] == sym {
                end += 1;
            }
            ranges.push((sym.clone(), start..end));
            start = end;
        }
        ranges
    }

    /// Row indices grouped by date, for cross-sectional operations.
    pub fn date_groups(&self) -> BTreeMap<NaiveDate, Vec<usize>> {
        let mut groups: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (i, d) in self.dates.iter().enumerate() {
            groups.entry(*d).or_default().push(i);
        }
        groups
    }

    /// Sorted distinct dates present in the frame.
    pub fn distinct_dates(&self) -> Vec<NaiveDate> {
        let mut dates = self.dates.clone();
        dates.sort();
        dates.dedup();
        dates
    }

    /// Left-join every column of `other` onto this frame on (symbol, date).
    ///
    /// This frame defines the row universe: rows of `other` without a match
    /// here are discarded, rows here without a match in `other` get NaN.
    /// Columns already present are overwritten.
    pub fn left_join(&mut self, other: &FeatureFrame) {
        // Row mapping computed once; both frames share the (symbol, date)
        // sort order so the lookup is a binary search.
        let mapping: Vec<Option<usize>> = (0..self.len())
            .map(|row| other.row_index(&self.symbols[row], self.dates[row]))
            .collect();

        for col in other.columns.clone() {
            let src = &other.series[&col];
            let mut dst = vec![f64::NAN; self.len()];
            for (row, slot) in dst.iter_mut().enumerate() {
                if let Some(j) = mapping[row] {
                    *slot = src[j];
                }
            }
            self.set_column(col, dst);
        }
    }

    /// Retain only rows with date in [start, end], preserving order.
    pub fn retain_date_range(&mut self, start: NaiveDate, end: NaiveDate) {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| self.dates[i] >= start && self.dates[i] <= end)
            .collect();

        let symbols = keep.iter().map(|&i| self.symbols[i].clone()).collect();
        let dates = keep.iter().map(|&i| self.dates[i]).collect();
        let labels = keep.iter().map(|&i| self.labels[i]).collect();
        self.symbols = symbols;
        self.dates = dates;
        self.labels = labels;

        for col in &self.columns {
            let filtered: Vec<f64> = {
                let old = &self.series[col];
                keep.iter().map(|&i| old[i]).collect()
            };
            self.series.insert(col.clone(), filtered);
        }
    }

    pub fn label(&self, row: usize) -> f64 {
        self.labels[row]
    }

    pub fn set_label(&mut self, row: usize, value: f64) {
        self.labels[row] = value;
    }

    /// Convert to persisted rows; non-finite values are dropped from the map.
    pub fn to_rows(&self) -> Vec<FeatureRow> {
        (0..self.len())
            .map(|i| {
                let mut values = BTreeMap::new();
                for col in &self.columns {
                    let v = self.series[col][i];
                    if v.is_finite() {
                        values.insert(col.clone(), v);
                    }
                }
                FeatureRow {
                    symbol: self.symbols[i].clone(),
                    date: self.dates[i],
                    values,
                    label: Some(self.labels[i]).filter(|l| l.is_finite()),
                }
            })
            .collect()
    }
}
