//! Pure risk scoring.
//!
//! Deterministic fold from a flag set to a score and label. No I/O, no
//! clock, no randomness: the same flags and weights always produce the
//! same outcome, which is what makes assessments reproducible across
//! runs and safe to memoize.

use std::collections::BTreeSet;

use crate::config::ScoringConfig;
use crate::models::types::{RiskFlag, RiskLabel};

/// Result of scoring one flag set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub score: u8,
    pub label: RiskLabel,
}

/// Fold flags into a clamped score and classify it.
///
/// Negative flags add their weight, positive flags subtract theirs, and
/// the running total clamps to 0..=100. A confirmed scam-list match
/// forces the SCAM_CONFIRMED label regardless of where the numeric
/// score landed; the score itself still reflects the accumulated
/// weights so reports stay comparable.
pub fn evaluate(flags: &BTreeSet<RiskFlag>, config: &ScoringConfig) -> ScoreOutcome {
    let mut total: i64 = 0;
    for flag in flags {
        let weight = config.weights.weight_of(*flag) as i64;
        if flag.is_positive() {
            total -= weight;
        } else {
            total += weight;
        }
    }
    let score = total.clamp(0, 100) as u8;

    let label = if flags.contains(&RiskFlag::ScamListMatch) {
        RiskLabel::ScamConfirmed
    } else {
        label_for(score, config)
    };

    ScoreOutcome { score, label }
}

/// Threshold classification for a score with no overriding flag
fn label_for(score: u8, config: &ScoringConfig) -> RiskLabel {
    if score >= config.high_risk_threshold {
        RiskLabel::HighRisk
    } else if score >= config.medium_risk_threshold {
        RiskLabel::MediumRisk
    } else if score >= config.low_risk_threshold {
        RiskLabel::LowRisk
    } else {
        RiskLabel::Unknown
    }
}
