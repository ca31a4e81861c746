//! Shared data models for DeepScan.
//!
//! This crate provides Serde-serializable types for:
//! - Video handles and their metadata
//! - Analyzer payloads and outcomes
//! - Normalized signals and fusion weights
//! - Risk tiers and the final analysis report
//! - Sampling quality presets

pub mod quality;
pub mod report;
pub mod signal;
pub mod utils;
pub mod video;

// Re-export common types
pub use quality::{AnalysisQuality, QualityParseError};
pub use report::{
    AnalysisId, AnalysisReport, AnalysisStatus, OutcomeKind, RiskLevel, SignalDetail,
    SignalScores,
};
pub use signal::{
    AnalyzerOutcome, AnalyzerPayload, FusionWeights, NormalizedSignal, SignalKind, WeightsError,
    WEIGHT_EPSILON,
};
pub use utils::{clamp_score, clamp_unit, round2};
pub use video::VideoHandle;
