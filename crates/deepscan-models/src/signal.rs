//! Analyzer outputs, normalized signals and fusion weights.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The three independent signals fused into a confidence score.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Facial-region distortion
    Face,
    /// Frame-to-frame visual anomaly
    Frame,
    /// Audio-visual alignment mismatch
    Audio,
}

impl SignalKind {
    /// All signal kinds in report order.
    pub const ALL: &'static [SignalKind] = &[SignalKind::Face, SignalKind::Frame, SignalKind::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Face => "face",
            SignalKind::Frame => "frame",
            SignalKind::Audio => "audio",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named numeric counters returned by an analyzer.
///
/// Field names are analyzer specific (`total_frames`, `distorted_faces`,
/// `cosine_similarity`, ...). Ordering is stable for serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AnalyzerPayload {
    fields: BTreeMap<String, f64>,
}

impl AnalyzerPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    /// First present field among `names`, for payloads with legacy aliases.
    pub fn get_any(&self, names: &[&str]) -> Option<f64> {
        names.iter().find_map(|name| self.get(name))
    }

    /// Read a counter. Negative or non-finite values count as zero.
    pub fn count(&self, name: &str) -> f64 {
        as_count(self.get(name))
    }

    /// Counter variant of `get_any`.
    pub fn count_any(&self, names: &[&str]) -> f64 {
        as_count(self.get_any(names))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

fn as_count(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

impl From<BTreeMap<String, f64>> for AnalyzerPayload {
    fn from(fields: BTreeMap<String, f64>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for AnalyzerPayload {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Outcome of one bounded analyzer call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalyzerOutcome {
    /// The analyzer returned before its deadline.
    Success { payload: AnalyzerPayload },
    /// The deadline elapsed; the worker was abandoned.
    Timeout,
    /// The analyzer returned an error or panicked.
    Failure { reason: String },
}

impl AnalyzerOutcome {
    pub fn success(payload: AnalyzerPayload) -> Self {
        Self::Success { payload }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalyzerOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&AnalyzerPayload> {
        match self {
            AnalyzerOutcome::Success { payload } => Some(payload),
            _ => None,
        }
    }

    /// Human-readable error for non-success outcomes.
    pub fn error_message(&self) -> Option<String> {
        match self {
            AnalyzerOutcome::Success { .. } => None,
            AnalyzerOutcome::Timeout => Some("Analysis timed out".to_string()),
            AnalyzerOutcome::Failure { reason } => Some(reason.clone()),
        }
    }
}

/// A per-signal quality score on the common `[0, 100]` scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedSignal {
    pub name: SignalKind,
    /// Higher means more authentic-looking.
    pub score: f64,
    /// False when the score is a fallback (timeout, failure, zero frames).
    pub reliable: bool,
}

impl NormalizedSignal {
    pub fn reliable(name: SignalKind, score: f64) -> Self {
        Self {
            name,
            score,
            reliable: true,
        }
    }

    pub fn fallback(name: SignalKind, score: f64) -> Self {
        Self {
            name,
            score,
            reliable: false,
        }
    }
}

/// Errors raised when validating a weight triple.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightsError {
    #[error("Fusion weight {0} is negative or not finite")]
    InvalidWeight(&'static str),

    #[error("Fusion weights sum to zero")]
    ZeroSum,
}

/// Tolerance used when checking that weights sum to 1.0.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// Fusion weights over the three signals. Normalized weights sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FusionWeights {
    pub face: f64,
    pub frame: f64,
    pub audio: f64,
}

impl FusionWeights {
    /// Weighting used when faces are detected reliably.
    pub const RELIABLE_FACE: FusionWeights = FusionWeights {
        face: 0.5,
        frame: 0.3,
        audio: 0.2,
    };

    /// Weighting used when the facial signal cannot be trusted.
    pub const DEGRADED_FACE: FusionWeights = FusionWeights {
        face: 0.3,
        frame: 0.3,
        audio: 0.4,
    };

    pub fn new(face: f64, frame: f64, audio: f64) -> Self {
        Self { face, frame, audio }
    }

    pub fn sum(&self) -> f64 {
        self.face + self.frame + self.audio
    }

    /// True when the weights sum to 1.0 within `WEIGHT_EPSILON`.
    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() <= WEIGHT_EPSILON
    }

    pub fn get(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::Face => self.face,
            SignalKind::Frame => self.frame,
            SignalKind::Audio => self.audio,
        }
    }

    /// Validate and rescale so the weights sum to 1.0.
    ///
    /// Triples already summing to 1.0 (within `WEIGHT_EPSILON`) are returned
    /// unchanged. Otherwise the audio weight absorbs the rescaling residue.
    pub fn normalized(self) -> Result<Self, WeightsError> {
        for (name, value) in [("face", self.face), ("frame", self.frame), ("audio", self.audio)] {
            if !value.is_finite() || value < 0.0 {
                return Err(WeightsError::InvalidWeight(name));
            }
        }

        let total = self.sum();
        if total <= 0.0 {
            return Err(WeightsError::ZeroSum);
        }
        if (total - 1.0).abs() <= WEIGHT_EPSILON {
            return Ok(self);
        }

        let face = self.face / total;
        let frame = self.frame / total;
        let audio = (1.0 - face - frame).max(0.0);
        Ok(Self { face, frame, audio })
    }
}
