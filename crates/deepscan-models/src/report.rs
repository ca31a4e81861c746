//! Analysis report models.
//!
//! `AnalysisReport` is the only value handed back to callers. It serializes
//! as a flat JSON record with numeric fields rounded to two decimals.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::signal::{AnalyzerOutcome, AnalyzerPayload, FusionWeights, SignalKind};
use crate::utils::round2;

/// Unique identifier for one analysis call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AnalysisId(pub String);

impl AnalysisId {
    /// Generate a new random analysis ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered risk tier, lowest risk first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum RiskLevel {
    #[serde(rename = "Low")]
    Low,
    #[serde(rename = "Low-Medium")]
    LowMedium,
    #[serde(rename = "Medium")]
    Medium,
    #[serde(rename = "Medium-High")]
    MediumHigh,
    #[serde(rename = "High")]
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::LowMedium => "Low-Medium",
            RiskLevel::Medium => "Medium",
            RiskLevel::MediumHigh => "Medium-High",
            RiskLevel::High => "High",
        }
    }

    /// Human-readable verdict for this tier.
    pub fn verdict(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Very likely authentic",
            RiskLevel::LowMedium => "Probably authentic",
            RiskLevel::Medium => "Uncertain authenticity",
            RiskLevel::MediumHigh => "Likely manipulated",
            RiskLevel::High => "Very likely manipulated",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Overall status of an analysis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Ok,
    Failed,
}

/// Which way an analyzer call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Timeout,
    Failure,
}

impl From<&AnalyzerOutcome> for OutcomeKind {
    fn from(outcome: &AnalyzerOutcome) -> Self {
        match outcome {
            AnalyzerOutcome::Success { .. } => OutcomeKind::Success,
            AnalyzerOutcome::Timeout => OutcomeKind::Timeout,
            AnalyzerOutcome::Failure { .. } => OutcomeKind::Failure,
        }
    }
}

/// Normalized per-signal scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SignalScores {
    pub face: f64,
    pub frame: f64,
    pub audio: f64,
}

impl SignalScores {
    pub fn get(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::Face => self.face,
            SignalKind::Frame => self.frame,
            SignalKind::Audio => self.audio,
        }
    }
}

/// Per-signal diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SignalDetail {
    /// Normalized score (rounded)
    pub score: f64,
    /// False when `score` is a fallback value
    pub reliable: bool,
    pub outcome: OutcomeKind,
    /// Analyzer error or the reason the score was degraded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Raw analyzer counters (empty for timeouts and failures)
    pub metrics: AnalyzerPayload,
    /// Wall-clock time spent in the analyzer call
    pub elapsed_seconds: f64,
    /// Short interpretation of the raw metrics, when the signal has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Final, immutable result of one analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReport {
    pub analysis_id: AnalysisId,
    /// Fused confidence in `[0, 100]`; higher means more likely authentic
    pub confidence_score: f64,
    /// Absent for failed reports
    pub risk_level: Option<RiskLevel>,
    /// Absent for failed reports
    pub verdict: Option<String>,
    pub per_signal_scores: SignalScores,
    /// Weights chosen by the fusion policy (absent for failed reports)
    pub fusion_weights: Option<FusionWeights>,
    pub signal_details: BTreeMap<SignalKind, SignalDetail>,
    pub processing_time_seconds: f64,
    pub status: AnalysisStatus,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_analysis_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_analysis_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_analysis_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// Build a failed report: zero confidence, no risk tier, populated error.
    pub fn failed(
        analysis_id: AnalysisId,
        error: impl Into<String>,
        processing_time_seconds: f64,
    ) -> Self {
        Self {
            analysis_id,
            confidence_score: 0.0,
            risk_level: None,
            verdict: None,
            per_signal_scores: SignalScores::default(),
            fusion_weights: None,
            signal_details: BTreeMap::new(),
            processing_time_seconds: round2(processing_time_seconds),
            status: AnalysisStatus::Failed,
            error: Some(error.into()),
            face_analysis_error: None,
            frame_analysis_error: None,
            audio_analysis_error: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AnalysisStatus::Ok
    }

    pub fn detail(&self, kind: SignalKind) -> Option<&SignalDetail> {
        self.signal_details.get(&kind)
    }

    /// Analyzer error recorded for `kind`, if any.
    pub fn analysis_error(&self, kind: SignalKind) -> Option<&str> {
        match kind {
            SignalKind::Face => self.face_analysis_error.as_deref(),
            SignalKind::Frame => self.frame_analysis_error.as_deref(),
            SignalKind::Audio => self.audio_analysis_error.as_deref(),
        }
    }

    /// True when every signal contributed a measured (non-fallback) score.
    pub fn is_fully_reliable(&self) -> bool {
        self.is_ok()
            && SignalKind::ALL
                .iter()
                .all(|kind| self.detail(*kind).map(|d| d.reliable).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_serialization() {
        let json = serde_json::to_string(&RiskLevel::LowMedium).unwrap();
        assert_eq!(json, r#""Low-Medium""#);
        let parsed: RiskLevel = serde_json::from_str(r#""Medium-High""#).unwrap();
        assert_eq!(parsed, RiskLevel::MediumHigh);
    }

    #[test]
    fn test_risk_levels_ordered() {
        assert!(RiskLevel::Low < RiskLevel::High);
        assert_eq!(RiskLevel::High.verdict(), "Very likely manipulated");
    }

    #[test]
    fn test_failed_report_shape() {
        let report = AnalysisReport::failed(AnalysisId::new(), "Video file not found", 0.004);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["status"], "failed");
        assert_eq!(json["confidence_score"], 0.0);
        assert_eq!(json["error"], "Video file not found");
        assert!(json["risk_level"].is_null());
        assert!(json.get("face_analysis_error").is_none());
        assert_eq!(report.processing_time_seconds, 0.0);
        assert!(!report.is_fully_reliable());
    }

    #[test]
    fn test_signal_details_keyed_by_name() {
        let mut report = AnalysisReport::failed(AnalysisId::new(), "x", 1.0);
        report.signal_details.insert(
            SignalKind::Audio,
            SignalDetail {
                score: 0.0,
                reliable: false,
                outcome: OutcomeKind::Failure,
                error: Some("no audio track".to_string()),
                metrics: AnalyzerPayload::new(),
                elapsed_seconds: 0.1,
                summary: None,
            },
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["signal_details"]["audio"]["reliable"], false);
        assert_eq!(json["signal_details"]["audio"]["outcome"], "failure");
    }
}
