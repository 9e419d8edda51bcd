//! Relative valuation — cross-sectional normalization of valuation ratios.
//!
//! With a sector map, each instrument's ratio is divided by its sector's
//! same-date mean. Without one, the fallback is a same-date cross-sectional
//! z-score, sign-flipped so that cheaper valuation scores higher. Degenerate
//! denominators (zero mean, zero stddev, too few peers) produce NaN, and any
//! infinity is mapped to NaN before it can reach the feature table.

use std::collections::HashMap;

use crate::frame::FeatureFrame;

/// (source column, output column) pairs this stage normalizes.
pub const VALUATION_METRICS: &[(&str, &str)] = &[("pe", "pe_vs_sector"), ("pb", "pb_vs_sector")];

/// Add `*_vs_sector` columns to the frame.
pub fn relative_valuation(frame: &mut FeatureFrame, sector_map: Option<&HashMap<String, String>>) {
    match sector_map {
        Some(map) => sector_relative(frame, map),
        None => {
            tracing::info!("no sector map available, using cross-sectional z-scores");
            cross_sectional_zscores(frame);
        }
    }
}

fn sector_relative(frame: &mut FeatureFrame, sector_map: &HashMap<String, String>) {
    let groups = frame.date_groups();

    for &(metric, out_col) in VALUATION_METRICS {
        let mut out = vec![f64::NAN; frame.len()];

        if frame.has_column(metric) {
            for rows in groups.values() {
                // Same-date mean per sector, over finite values only.
                let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
                for &row in rows {
                    let v = frame.value(metric, row);
                    if v.is_nan() {
                        continue;
                    }
                    if let Some(sector) = sector_map.get(frame.symbol(row)) {
                        let entry = sums.entry(sector.as_str()).or_insert((0.0, 0));
                        entry.0 += v;
                        entry.1 += 1;
                    }
                }

                for &row in rows {
                    let v = frame.value(metric, row);
                    if v.is_nan() {
                        continue;
                    }
                    let sector = match sector_map.get(frame.symbol(row)) {
                        Some(s) => s.as_str(),
                        None => continue, // unknown sector → NaN
                    };
                    if let Some(&(sum, count)) = sums.get(sector) {
                        let mean = sum / count as f64;
                        let ratio = v / mean;
                        if ratio.is_finite() {
                            out[row] = ratio;
                        }
                    }
                }
            }
        }

        frame.set_column(out_col, out);
    }
}

fn cross_sectional_zscores(frame: &mut FeatureFrame) {
    let groups = frame.date_groups();

    for &(metric, out_col) in VALUATION_METRICS {
        let mut out = vec![f64::NAN; frame.len()];

        if frame.has_column(metric) {
            for rows in groups.values() {
                let finite: Vec<(usize, f64)> = rows
                    .iter()
                    .map(|&r| (r, frame.value(metric, r)))
                    .filter(|(_, v)| !v.is_nan())
                    .collect();
                if finite.len() < 2 {
                    continue; // stddev undefined
                }

                let n = finite.len() as f64;
                let mean = finite.iter().map(|(_, v)| v).sum::<f64>() / n;
                let var = finite
                    .iter()
                    .map(|(_, v)| (v - mean) * (v - mean))
                    .sum::<f64>()
                    / (n - 1.0);
                let std = var.sqrt();
                if std == 0.0 {
                    continue;
                }

                for (row, v) in finite {
                    // Lower raw valuation is better: flip the sign.
                    let z = -(v - mean) / std;
                    if z.is_finite() {
                        out[row] = z;
                    }
                }
            }
        }

        frame.set_column(out_col, out);
    }
}
