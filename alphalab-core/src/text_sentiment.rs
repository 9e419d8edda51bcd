//! Headline sentiment scoring seam.
//!
//! Scoring a headline is an ingestion-time concern: the news reader calls a
//! scorer for rows that arrive without a precomputed polarity. The scorer is
//! an explicit handle constructed once at process start and held by the
//! caller's context; there is no lazily-initialized global. When the real
//! model is unavailable the caller falls back to [`NeutralScorer`], whose
//! capability check reports the degradation honestly and whose output is the
//! neutral polarity, never an error.

use std::collections::HashSet;

/// Polarity components for one piece of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    /// Positive evidence in [0, 1].
    pub positive: f64,
    /// Negative evidence in [0, 1].
    pub negative: f64,
    /// Compound polarity in [-1, 1]; 0.0 is neutral.
    pub compound: f64,
}

impl SentimentScore {
    pub const NEUTRAL: SentimentScore = SentimentScore {
        positive: 0.0,
        negative: 0.0,
        compound: 0.0,
    };
}

/// Scores headline text. Implementations must be cheap to share across a
/// whole ingestion pass.
pub trait SentimentScorer: Send + Sync {
    /// Whether a real model backs this scorer. Callers use this to log the
    /// degradation once instead of per headline.
    fn is_available(&self) -> bool;

    fn score(&self, text: &str) -> SentimentScore;
}

/// The stub fallback: always neutral.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralScorer;

impl SentimentScorer for NeutralScorer {
    fn is_available(&self) -> bool {
        false
    }

    fn score(&self, _text: &str) -> SentimentScore {
        SentimentScore::NEUTRAL
    }
}

/// Word-list scorer: counts positive and negative term hits.
///
/// compound = (pos - neg) / (pos + neg) over matched terms, 0.0 when nothing
/// matches. Deliberately coarse; it exists so offline runs produce non-flat
/// sentiment without any model dependency.
pub struct LexiconScorer {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
}

const POSITIVE_TERMS: &[&str] = &[
    "beat", "beats", "strong", "growth", "record", "upgrade", "upgraded", "profit", "gains",
    "surge", "surged", "rally", "bullish", "outperform", "raised", "wins", "win", "expands",
    "approval", "breakthrough",
];

const NEGATIVE_TERMS: &[&str] = &[
    "miss", "misses", "weak", "decline", "downgrade", "downgraded", "loss", "losses", "falls",
    "fell", "plunge", "plunged", "bearish", "underperform", "cut", "lawsuit", "fraud", "probe",
    "recall", "default",
];

impl Default for LexiconScorer {
    fn default() -> Self {
        Self {
            positive: POSITIVE_TERMS.iter().copied().collect(),
            negative: NEGATIVE_TERMS.iter().copied().collect(),
        }
    }
}

impl SentimentScorer for LexiconScorer {
    fn is_available(&self) -> bool {
        true
    }

    fn score(&self, text: &str) -> SentimentScore {
        let mut pos = 0usize;
        let mut neg = 0usize;
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_ascii_lowercase();
            if self.positive.contains(token.as_str()) {
                pos += 1;
            } else if self.negative.contains(token.as_str()) {
                neg += 1;
            }
        }

        let total = pos + neg;
        if total == 0 {
            return SentimentScore::NEUTRAL;
        }
        SentimentScore {
            positive: pos as f64 / total as f64,
            negative: neg as f64 / total as f64,
            compound: (pos as f64 - neg as f64) / total as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_scorer_reports_unavailable() {
        let scorer = NeutralScorer;
        assert!(!scorer.is_available());
        assert_eq!(scorer.score("record profit surge"), SentimentScore::NEUTRAL);
    }

    #[test]
    fn lexicon_scores_signed_polarity() {
        let scorer = LexiconScorer::default();
        assert!(scorer.is_available());

        let up = scorer.score("Quarterly profit beats estimates, shares surge");
        assert!(up.compound > 0.0);
        assert!(up.positive > up.negative);

        let down = scorer.score("Regulator opens fraud probe after weak results");
        assert!(down.compound < 0.0);

        let flat = scorer.score("Company schedules annual general meeting");
        assert_eq!(flat, SentimentScore::NEUTRAL);
    }

    #[test]
    fn lexicon_is_case_insensitive() {
        let scorer = LexiconScorer::default();
        let a = scorer.score("STRONG GROWTH");
        let b = scorer.score("strong growth");
        assert_eq!(a, b);
        assert_eq!(a.compound, 1.0);
    }

    #[test]
    fn mixed_headline_nets_out() {
        let scorer = LexiconScorer::default();
        let s = scorer.score("strong growth but lawsuit looms");
        // 2 positive, 1 negative.
        assert!((s.compound - 1.0 / 3.0).abs() < 1e-12);
    }
}
