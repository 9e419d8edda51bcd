//! FundamentalSnapshot — a point-in-time fundamentals disclosure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One fundamentals disclosure for a symbol, valid from `asof` onward.
///
/// Multiple snapshots per symbol form a step function over time; the as-of
/// join attaches the latest snapshot not newer than the trading date. Every
/// metric is nullable — screeners routinely omit ratios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub symbol: String,
    pub asof: NaiveDate,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub ev_ebitda: Option<f64>,
    pub roe: Option<f64>,
    pub roce: Option<f64>,
    pub de_ratio: Option<f64>,
    pub eps_g3y: Option<f64>,
    pub rev_g3y: Option<f64>,
    pub profit_g3y: Option<f64>,
    pub opm: Option<f64>,
    pub npm: Option<f64>,
    pub div_yield: Option<f64>,
    pub promoter_hold: Option<f64>,
    pub pledged_pct: Option<f64>,
}

impl FundamentalSnapshot {
    /// The fixed fundamentals column schema, in emission order.
    ///
    /// The as-of join always emits all of these, as NaN when no snapshot
    /// applies, so the feature table schema stays uniform.
    pub const COLUMNS: &'static [&'static str] = &[
        "pe",
        "pb",
        "ev_ebitda",
        "roe",
        "roce",
        "de_ratio",
        "eps_g3y",
        "rev_g3y",
        "profit_g3y",
        "opm",
        "npm",
        "div_yield",
        "promoter_hold",
        "pledged_pct",
    ];

    /// Construct an all-null snapshot.
    pub fn empty(symbol: impl Into<String>, asof: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            asof,
            pe: None,
            pb: None,
            ev_ebitda: None,
            roe: None,
            roce: None,
            de_ratio: None,
            eps_g3y: None,
            rev_g3y: None,
            profit_g3y: None,
            opm: None,
            npm: None,
            div_yield: None,
            promoter_hold: None,
            pledged_pct: None,
        }
    }

    /// Metric value by column name, or None for an unknown name.
    pub fn metric(&self, column: &str) -> Option<f64> {
        match column {
            "pe" => self.pe,
            "pb" => self.pb,
            "ev_ebitda" => self.ev_ebitda,
            "roe" => self.roe,
            "roce" => self.roce,
            "de_ratio" => self.de_ratio,
            "eps_g3y" => self.eps_g3y,
            "rev_g3y" => self.rev_g3y,
            "profit_g3y" => self.profit_g3y,
            "opm" => self.opm,
            "npm" => self.npm,
            "div_yield" => self.div_yield,
            "promoter_hold" => self.promoter_hold,
            "pledged_pct" => self.pledged_pct,
            _ => None,
        }
    }
}
