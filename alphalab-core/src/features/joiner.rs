//! Feature joiner and cleaner.
//!
//! The technicals frame defines the row universe; fundamentals and sentiment
//! columns are left-joined onto it. Cleaning then drops columns whose missing
//! rate exceeds a threshold and fills what remains per instrument:
//! forward-fill, backward-fill (covers the leading warm-up gap), then zero.
//! The (symbol, date) keys are structural and are never dropped or filled.

use tracing::info;

use crate::frame::FeatureFrame;

/// Merge the three stage outputs on (symbol, date).
///
/// `technicals` is consumed and returned as the joined frame — it is never
/// left-joined away.
pub fn join_features(
    mut technicals: FeatureFrame,
    fundamentals: &FeatureFrame,
    sentiment: &FeatureFrame,
) -> FeatureFrame {
    technicals.left_join(fundamentals);
    technicals.left_join(sentiment);
    technicals
}

/// Drop columns with excessive missingness, then fill the rest.
pub fn clean_features(frame: &mut FeatureFrame, nan_threshold: f64) {
    let to_drop: Vec<String> = frame
        .columns()
        .iter()
        .filter(|col| frame.missing_rate(col) > nan_threshold)
        .cloned()
        .collect();

    if !to_drop.is_empty() {
        info!(
            count = to_drop.len(),
            columns = ?to_drop,
            "dropping columns above missing-rate threshold {nan_threshold}"
        );
        for col in &to_drop {
            frame.drop_column(col);
        }
    }

    let ranges = frame.symbol_ranges();
    for col in frame.columns().to_vec() {
        let series = frame.column_mut(&col).expect("iterating own columns");
        for (_, range) in &ranges {
            // Forward fill within the instrument.
            let mut last = f64::NAN;
            for i in range.clone() {
                if series[i].is_nan() {
                    series[i] = last;
                } else {
                    last = series[i];
                }
            }
            // Backward fill for the leading gap.
            let mut next = f64::NAN;
            for i in range.clone().rev() {
                if series[i].is_nan() {
                    series[i] = next;
                } else {
                    next = series[i];
                }
            }
            // Anything still missing (whole instrument empty) becomes zero.
            for i in range.clone() {
                if series[i].is_nan() {
                    series[i] = 0.0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day0: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day0)
    }

    fn spine(symbols: &[&str], days: i64) -> FeatureFrame {
        let mut keys = Vec::new();
        for s in symbols {
            for i in 0..days {
                keys.push((s.to_string(), d(i)));
            }
        }
        FeatureFrame::from_keys(keys)
    }

    #[test]
    fn join_keeps_technicals_universe() {
        let mut technicals = spine(&["A", "B"], 3);
        technicals.set_column("rsi_14", vec![50.0; 6]);

        // Fundamentals only cover symbol A.
        let mut fundamentals = spine(&["A"], 3);
        fundamentals.set_column("pe", vec![20.0; 3]);

        let sentiment = spine(&["A", "B"], 3);

        let joined = join_features(technicals, &fundamentals, &sentiment);
        assert_eq!(joined.len(), 6);
        let b0 = joined.row_index("B", d(0)).unwrap();
        assert!(joined.value("pe", b0).is_nan());
        let a0 = joined.row_index("A", d(0)).unwrap();
        assert_eq!(joined.value("pe", a0), 20.0);
    }

    #[test]
    fn mostly_missing_column_is_dropped() {
        let mut frame = spine(&["A"], 10);
        let mut sparse = vec![f64::NAN; 10];
        sparse[0] = 1.0; // 90% missing
        frame.set_column("sparse", sparse);
        frame.set_column("dense", vec![2.0; 10]);

        clean_features(&mut frame, 0.8);

        assert!(!frame.has_column("sparse"));
        assert!(frame.has_column("dense"));
    }

    #[test]
    fn column_at_threshold_is_kept() {
        let mut frame = spine(&["A"], 10);
        let mut series = vec![f64::NAN; 10];
        series[8] = 1.0;
        series[9] = 1.0; // exactly 80% missing — not above the threshold
        frame.set_column("edge", series);

        clean_features(&mut frame, 0.8);
        assert!(frame.has_column("edge"));
    }

    #[test]
    fn fill_is_forward_then_backward_then_zero() {
        let mut frame = spine(&["A", "B"], 4);
        // A: leading gap then values → backward fill covers the gap.
        // B: gap in the middle → forward fill carries the last value.
        let mut series = vec![f64::NAN; 8];
        series[1] = 5.0; // A day 1
        series[3] = 7.0; // A day 3
        series[4] = 1.0; // B day 0
        // B days 1..3 missing → forward fill with 1.0
        frame.set_column("x", series);

        clean_features(&mut frame, 0.99);
        let x = frame.column("x").unwrap();

        assert_eq!(x[0], 5.0); // backward-filled from day 1
        assert_eq!(x[1], 5.0);
        assert_eq!(x[2], 5.0); // forward-filled from day 1
        assert_eq!(x[3], 7.0);
        assert_eq!(x[4], 1.0);
        assert_eq!(x[5], 1.0);
        assert_eq!(x[6], 1.0);
        assert_eq!(x[7], 1.0);
    }

    #[test]
    fn fill_never_crosses_instruments() {
        let mut frame = spine(&["A", "B"], 2);
        // A fully missing, B fully present: A must become zero, not B's values.
        let series = vec![f64::NAN, f64::NAN, 9.0, 9.0];
        frame.set_column("x", series);

        clean_features(&mut frame, 0.99);
        let x = frame.column("x").unwrap();
        assert_eq!(x[0], 0.0);
        assert_eq!(x[1], 0.0);
        assert_eq!(x[2], 9.0);
    }

    #[test]
    fn cleaned_frame_has_no_missing_values() {
        let mut frame = spine(&["A"], 6);
        let series = vec![f64::NAN, 1.0, f64::NAN, f64::NAN, 2.0, f64::NAN];
        frame.set_column("x", series);

        clean_features(&mut frame, 0.9);
        let x = frame.column("x").unwrap();
        assert!(x.iter().all(|v| v.is_finite()));
    }
}
