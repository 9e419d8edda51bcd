//! Sentiment aggregation — per-day news rollups with trailing burst windows.
//!
//! Items are deduplicated by (symbol, url) keeping the first occurrence,
//! truncated to day granularity, and rolled up onto the trading-day spine:
//! same-day mean sentiment, then trailing rolling sums of headline count over
//! 3 and 7 spine days and a trailing 7-day rolling mean of daily sentiment.
//! Windows look strictly backward and include the current day.
//!
//! Days with zero news get sentiment 0.0 and count 0, not NaN — silence is
//! itself a signal and must not be conflated with "unknown".

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::domain::NewsItem;
use crate::frame::FeatureFrame;

/// Sentiment feature columns, in emission order.
pub const SENTIMENT_COLUMNS: &[&str] = &["sent_mean_comp", "burst_3d", "burst_7d", "sent_ma_7d"];

/// Aggregate news sentiment onto the trading-day spine.
pub fn aggregate_news_sentiment(spine: &FeatureFrame, news: &[NewsItem]) -> FeatureFrame {
    let mut out = spine.keys_like();
    let n = out.len();

    // Dedup by (symbol, url), first occurrence wins.
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    // (symbol, day) → (sentiment sum, headline count)
    let mut daily: HashMap<(String, NaiveDate), (f64, u64)> = HashMap::new();
    for item in news {
        if !seen.insert((item.symbol.as_str(), item.url.as_str())) {
            continue;
        }
        let entry = daily
            .entry((item.symbol.clone(), item.day()))
            .or_insert((0.0, 0));
        entry.0 += item.sentiment;
        entry.1 += 1;
    }

    let mut sent_mean = vec![0.0; n];
    let mut counts = vec![0.0; n];
    for row in 0..n {
        let key = (out.symbol(row).to_string(), out.date(row));
        if let Some(&(sum, count)) = daily.get(&key) {
            sent_mean[row] = sum / count as f64;
            counts[row] = count as f64;
        }
    }

    let mut burst_3d = vec![0.0; n];
    let mut burst_7d = vec![0.0; n];
    let mut sent_ma_7d = vec![0.0; n];

    for (_, range) in out.symbol_ranges() {
        for row in range.clone() {
            let local = row - range.start;
            let w3 = range.start + local.saturating_sub(2);
            let w7 = range.start + local.saturating_sub(6);
            burst_3d[row] = counts[w3..=row].iter().sum();
            burst_7d[row] = counts[w7..=row].iter().sum();
            let window = &sent_mean[w7..=row];
            sent_ma_7d[row] = window.iter().sum::<f64>() / window.len() as f64;
        }
    }

    out.set_column("sent_mean_comp", sent_mean);
    out.set_column("burst_3d", burst_3d);
    out.set_column("burst_7d", burst_7d);
    out.set_column("sent_ma_7d", sent_ma_7d);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn d(day0: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day0)
    }

    fn ts(day0: i64, hour: u32) -> NaiveDateTime {
        d(day0).and_hms_opt(hour, 0, 0).unwrap()
    }

    fn spine(symbol: &str, days: i64) -> FeatureFrame {
        FeatureFrame::from_keys((0..days).map(|i| (symbol.to_string(), d(i))).collect())
    }

    fn item(symbol: &str, day0: i64, hour: u32, url: &str, sentiment: f64) -> NewsItem {
        NewsItem {
            symbol: symbol.to_string(),
            published: ts(day0, hour),
            url: url.to_string(),
            sentiment,
        }
    }

    #[test]
    fn same_day_items_average() {
        let frame = spine("AAPL", 5);
        let news = vec![
            item("AAPL", 0, 10, "http://n/1", 0.5),
            item("AAPL", 0, 14, "http://n/2", 0.7),
            item("AAPL", 1, 10, "http://n/3", -0.3),
        ];

        let out = aggregate_news_sentiment(&frame, &news);
        let sent = out.column("sent_mean_comp").unwrap();
        assert!((sent[0] - 0.6).abs() < 1e-12);
        assert!((sent[1] - (-0.3)).abs() < 1e-12);
        // Quiet day: zero, not NaN.
        assert_eq!(sent[2], 0.0);
    }

    #[test]
    fn burst_counts_ramp() {
        // Headlines per day: 1, 2, 3, 3, 3, ... for 10 days.
        let frame = spine("AAPL", 10);
        let mut news = Vec::new();
        for day in 0..10i64 {
            let count = (day + 1).min(3);
            for i in 0..count {
                news.push(item(
                    "AAPL",
                    day,
                    10 + i as u32,
                    &format!("http://n/day{day}_{i}"),
                    0.5,
                ));
            }
        }

        let out = aggregate_news_sentiment(&frame, &news);
        let b3 = out.column("burst_3d").unwrap();
        let b7 = out.column("burst_7d").unwrap();

        // Day index 2 (third day): 1 + 2 + 3 = 6.
        assert_eq!(b3[2], 6.0);
        // Day index 6 (seventh day): 1 + 2 + 3 + 3 + 3 + 3 + 3 = 18.
        assert_eq!(b7[6], 18.0);
        // Steady state: 3 + 3 + 3 = 9.
        assert_eq!(b3[9], 9.0);
    }

    #[test]
    fn duplicate_urls_count_once() {
        let frame = spine("AAPL", 3);
        let news = vec![
            item("AAPL", 0, 10, "http://n/same", 0.8),
            item("AAPL", 0, 15, "http://n/same", -0.9), // syndicated copy, ignored
        ];

        let out = aggregate_news_sentiment(&frame, &news);
        assert_eq!(out.value("burst_3d", 0), 1.0);
        assert!((out.value("sent_mean_comp", 0) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn same_url_different_symbols_both_count() {
        let mut keys = Vec::new();
        keys.push(("AAPL".to_string(), d(0)));
        keys.push(("MSFT".to_string(), d(0)));
        let frame = FeatureFrame::from_keys(keys);

        let news = vec![
            item("AAPL", 0, 10, "http://n/shared", 0.4),
            item("MSFT", 0, 10, "http://n/shared", 0.4),
        ];

        let out = aggregate_news_sentiment(&frame, &news);
        let a = frame.row_index("AAPL", d(0)).unwrap();
        let m = frame.row_index("MSFT", d(0)).unwrap();
        assert_eq!(out.value("burst_3d", a), 1.0);
        assert_eq!(out.value("burst_3d", m), 1.0);
    }

    #[test]
    fn no_news_is_all_zero() {
        let frame = spine("AAPL", 4);
        let out = aggregate_news_sentiment(&frame, &[]);

        for col in SENTIMENT_COLUMNS {
            let series = out.column(col).unwrap();
            assert!(series.iter().all(|&v| v == 0.0), "{col} should be zero");
        }
    }

    #[test]
    fn rolling_mean_uses_trailing_window_only() {
        let frame = spine("AAPL", 9);
        // One strong day at index 0, silence after.
        let news = vec![item("AAPL", 0, 10, "http://n/1", 1.0)];

        let out = aggregate_news_sentiment(&frame, &news);
        let ma = out.column("sent_ma_7d").unwrap();

        assert!((ma[0] - 1.0).abs() < 1e-12);
        // Index 3: window covers days 0..=3 → 1.0 / 4.
        assert!((ma[3] - 0.25).abs() < 1e-12);
        // Index 6: 1.0 / 7.
        assert!((ma[6] - 1.0 / 7.0).abs() < 1e-12);
        // Index 7: the burst day has rolled out of the window.
        assert_eq!(ma[7], 0.0);
    }
}
