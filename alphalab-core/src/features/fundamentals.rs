//! As-of fundamentals join — backward-looking, per-instrument, staleness-capped.
//!
//! For each (symbol, trading date) row, attaches the snapshot with the latest
//! as-of date ≤ the trading date, but only while the gap stays within the
//! staleness cap. A snapshot dated after the trading date is never attached;
//! that would leak the future into the row.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::FundamentalSnapshot;
use crate::frame::FeatureFrame;

/// Join fundamentals onto the trading-day spine.
///
/// Returns a frame over the spine's keys carrying the full fundamentals
/// column schema — NaN wherever no snapshot applies (none disclosed yet, or
/// the latest one is older than `staleness_days`).
pub fn asof_join_fundamentals(
    spine: &FeatureFrame,
    snapshots: &[FundamentalSnapshot],
    staleness_days: i64,
) -> FeatureFrame {
    let mut out = spine.keys_like();
    for col in FundamentalSnapshot::COLUMNS {
        out.ensure_column(col);
    }

    // Per-symbol snapshot sequences sorted by as-of date. A later snapshot
    // with the same (symbol, asof) overwrites — disclosures are corrected.
    let mut by_symbol: BTreeMap<&str, BTreeMap<NaiveDate, &FundamentalSnapshot>> = BTreeMap::new();
    for snap in snapshots {
        by_symbol
            .entry(snap.symbol.as_str())
            .or_default()
            .insert(snap.asof, snap);
    }

    for (symbol, range) in out.symbol_ranges() {
        let snaps: Vec<&FundamentalSnapshot> = match by_symbol.get(symbol.as_str()) {
            Some(m) => m.values().copied().collect(),
            None => continue, // full schema stays NaN
        };

        // Both sides are date-sorted: one forward scan per symbol.
        let mut cursor = 0usize;
        for row in range {
            let date = out.date(row);
            while cursor + 1 < snaps.len() && snaps[cursor + 1].asof <= date {
                cursor += 1;
            }
            let snap = snaps[cursor];
            if snap.asof > date {
                continue; // first snapshot still in the future
            }
            let age = (date - snap.asof).num_days();
            if age > staleness_days {
                continue; // stale beyond the cap
            }
            for col in FundamentalSnapshot::COLUMNS {
                if let Some(v) = snap.metric(col) {
                    let series = out.column_mut(col).expect("column ensured above");
                    series[row] = v;
                }
            }
        }
    }

    out
}
