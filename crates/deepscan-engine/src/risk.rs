//! Confidence-to-risk classification.

use deepscan_models::{round2, RiskLevel};

/// Lower (exclusive) bound of each tier, highest first. Anything at or below
/// the last bound is `High`.
const TIER_BOUNDS: &[(f64, RiskLevel)] = &[
    (80.0, RiskLevel::Low),
    (65.0, RiskLevel::LowMedium),
    (45.0, RiskLevel::Medium),
    (30.0, RiskLevel::MediumHigh),
];

/// Map a confidence score to its risk tier and verdict.
///
/// The score is rounded to two decimals first so the tier always agrees
/// with the reported number.
pub fn classify(confidence_score: f64) -> (RiskLevel, &'static str) {
    let score = round2(confidence_score);
    let level = TIER_BOUNDS
        .iter()
        .find(|(bound, _)| score > *bound)
        .map(|(_, level)| *level)
        .unwrap_or(RiskLevel::High);
    (level, level.verdict())
}
