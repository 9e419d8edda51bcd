//! End-to-end feature stage chain over synthetic multi-instrument data.
//!
//! Drives technicals → as-of fundamentals → relative valuation → sentiment →
//! join → clean → composite the way the runner does, and checks the
//! properties that hold across stage boundaries: temporal causality of the
//! as-of join, uniform schema across instruments, a fully finite table after
//! cleaning, and bounded composite scores.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use alphalab_core::domain::{FundamentalSnapshot, NewsItem, PriceBar};
use alphalab_core::features::{
    aggregate_news_sentiment, asof_join_fundamentals, clean_features,
    compute_composite_scores, compute_technical_indicators, group_bars_by_symbol,
    join_features, relative_valuation, CompositeWeights,
};
use alphalab_core::frame::FeatureFrame;

fn day(i: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i)
}

fn synthetic_bars(symbol: &str, n: i64, base: f64) -> Vec<PriceBar> {
    (0..n)
        .map(|i| {
            let close = base + (i as f64 * 0.25).sin() * 4.0 + i as f64 * 0.08;
            PriceBar {
                symbol: symbol.to_string(),
                date: day(i),
                open: close - 0.4,
                high: close + 1.2,
                low: close - 1.3,
                close,
                volume: 25_000,
                adj_close: close,
            }
        })
        .collect()
}

fn snapshot(symbol: &str, asof: NaiveDate, pe: f64, roe: f64) -> FundamentalSnapshot {
    let mut s = FundamentalSnapshot::empty(symbol, asof);
    s.pe = Some(pe);
    s.pb = Some(pe / 4.0);
    s.roe = Some(roe);
    s.roce = Some(roe * 1.1);
    s.opm = Some(0.22);
    s.npm = Some(0.15);
    s
}

fn build_frame(days: i64) -> FeatureFrame {
    let mut bars = synthetic_bars("ALPHA", days, 100.0);
    bars.extend(synthetic_bars("BETA", days, 240.0));
    let by_symbol = group_bars_by_symbol(bars);

    let technicals = compute_technical_indicators(&by_symbol);

    let snapshots = vec![
        snapshot("ALPHA", day(0), 18.0, 0.21),
        snapshot("ALPHA", day(45), 19.5, 0.20),
        snapshot("BETA", day(0), 32.0, 0.12),
    ];
    let mut fundamentals = asof_join_fundamentals(&technicals, &snapshots, 120);
    relative_valuation(&mut fundamentals, None);

    let news: Vec<NewsItem> = (0..10)
        .map(|i| NewsItem {
            symbol: "ALPHA".to_string(),
            published: day(i).and_hms_opt(9, 30, 0).unwrap(),
            url: format!("http://news/alpha/{i}"),
            sentiment: 0.3,
        })
        .collect();
    let sentiment = aggregate_news_sentiment(&technicals, &news);

    let mut frame = join_features(technicals, &fundamentals, &sentiment);
    clean_features(&mut frame, 0.8);
    compute_composite_scores(&mut frame, &CompositeWeights::default());
    frame
}

#[test]
fn schema_is_uniform_across_instruments() {
    let frame = build_frame(90);

    // Every surviving column has a value slot for every row of every
    // instrument; reading any column on any row never panics.
    for col in frame.columns() {
        let series = frame.column(col).unwrap();
        assert_eq!(series.len(), frame.len(), "column {col} length mismatch");
    }
    assert_eq!(frame.len(), 180);
}

#[test]
fn cleaned_table_is_fully_finite() {
    let frame = build_frame(90);
    for col in frame.columns() {
        let series = frame.column(col).unwrap();
        assert!(
            series.iter().all(|v| v.is_finite()),
            "column {col} still has non-finite values after cleaning"
        );
    }
}

#[test]
fn asof_values_respect_causality() {
    // Before day 45, ALPHA must carry the day-0 snapshot (pe 18); from day 45
    // on, the newer one (pe 19.5). The raw pe column is forward-filled by the
    // cleaner but its pre-fill semantics come from the as-of join, so check
    // the join output directly.
    let mut bars = synthetic_bars("ALPHA", 90, 100.0);
    bars.extend(synthetic_bars("BETA", 90, 240.0));
    let by_symbol = group_bars_by_symbol(bars);
    let technicals = compute_technical_indicators(&by_symbol);

    let snapshots = vec![
        snapshot("ALPHA", day(0), 18.0, 0.21),
        snapshot("ALPHA", day(45), 19.5, 0.20),
    ];
    let joined = asof_join_fundamentals(&technicals, &snapshots, 120);

    let row_at = |d: i64| joined.row_index("ALPHA", day(d)).unwrap();
    assert_eq!(joined.value("pe", row_at(10)), 18.0);
    assert_eq!(joined.value("pe", row_at(44)), 18.0);
    assert_eq!(joined.value("pe", row_at(45)), 19.5);
    assert_eq!(joined.value("pe", row_at(89)), 19.5);

    // BETA never disclosed anything: full schema, all missing.
    let beta0 = joined.row_index("BETA", day(0)).unwrap();
    for col in FundamentalSnapshot::COLUMNS {
        assert!(joined.value(col, beta0).is_nan());
    }
}

#[test]
fn long_window_indicators_are_dropped_on_short_history() {
    // 90 days cannot fill sma_200/ema_200; the cleaner must drop them.
    let frame = build_frame(90);
    assert!(!frame.has_column("sma_200"));
    assert!(!frame.has_column("ema_200"));
    // Short-window indicators survive.
    assert!(frame.has_column("sma_20"));
    assert!(frame.has_column("rsi_14"));
}

#[test]
fn composite_scores_are_bounded() {
    let frame = build_frame(90);

    for col in [
        "quality_score",
        "valuation_score",
        "momentum_score",
        "sentiment_score",
    ] {
        let series = frame.column(col).unwrap();
        assert!(
            series.iter().all(|v| (0.0..=1.0).contains(v)),
            "{col} out of [0, 1]"
        );
    }

    // Default weights sum to 1, so the blend stays in [0, 1] too.
    let composite = frame.column("composite_score").unwrap();
    assert!(composite.iter().all(|v| (0.0..=1.0).contains(v)));

    let risk = frame.column("risk_adjusted_score").unwrap();
    assert_eq!(composite, risk);
}

#[test]
fn quiet_instrument_has_zero_sentiment_not_missing() {
    let frame = build_frame(90);

    // BETA had no news at all: zeros everywhere, still present after cleaning.
    let groups: BTreeMap<&str, Vec<usize>> =
        (0..frame.len()).fold(BTreeMap::new(), |mut acc, i| {
            acc.entry(frame.symbol(i)).or_default().push(i);
            acc
        });

    for &row in &groups["BETA"] {
        assert_eq!(frame.value("sent_mean_comp", row), 0.0);
        assert_eq!(frame.value("burst_7d", row), 0.0);
    }
    // ALPHA's early rows carry the burst.
    let alpha0 = frame.row_index("ALPHA", day(2)).unwrap();
    assert_eq!(frame.value("burst_3d", alpha0), 3.0);
}
