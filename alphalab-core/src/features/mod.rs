//! Feature engineering stages.
//!
//! Each stage is a pure function from domain inputs to (or onto) a
//! `FeatureFrame`. The technicals stage defines the row universe; the
//! fundamentals and sentiment stages produce frames over the same keys which
//! the joiner left-joins back, then cleans and scores.

pub mod composite;
pub mod fundamentals;
pub mod joiner;
pub mod sentiment;
pub mod technicals;
pub mod valuation;

pub use composite::{compute_composite_scores, CompositeWeights};
pub use fundamentals::asof_join_fundamentals;
pub use joiner::{clean_features, join_features};
pub use sentiment::aggregate_news_sentiment;
pub use technicals::{compute_technical_indicators, group_bars_by_symbol};
pub use valuation::relative_valuation;
