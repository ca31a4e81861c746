//! Weighted fusion of the three normalized signals.

use tracing::debug;

use deepscan_models::{clamp_score, round2, FusionWeights, SignalKind};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::normalizer::NormalizedSet;

/// Chosen weights plus the fused score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionOutcome {
    pub weights: FusionWeights,
    /// Clamped to `[0, 100]` and rounded to two decimals
    pub confidence_score: f64,
}

/// Selects a weight triple from facial-detection reliability and fuses.
#[derive(Debug, Clone)]
pub struct FusionPolicy {
    reliable_weights: FusionWeights,
    degraded_weights: FusionWeights,
    detection_rate_threshold: f64,
}

impl Default for FusionPolicy {
    fn default() -> Self {
        Self {
            reliable_weights: FusionWeights::RELIABLE_FACE,
            degraded_weights: FusionWeights::DEGRADED_FACE,
            detection_rate_threshold: 0.5,
        }
    }
}

impl FusionPolicy {
    /// Build a policy, rescaling both weight triples to sum to 1.0.
    pub fn new(
        reliable_weights: FusionWeights,
        degraded_weights: FusionWeights,
        detection_rate_threshold: f64,
    ) -> EngineResult<Self> {
        Ok(Self {
            reliable_weights: reliable_weights.normalized()?,
            degraded_weights: degraded_weights.normalized()?,
            detection_rate_threshold,
        })
    }

    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        Self::new(
            config.reliable_weights,
            config.degraded_weights,
            config.detection_rate_threshold,
        )
    }

    /// Reliable weighting applies only when the facial signal was measured
    /// and faces were found in more than the threshold share of frames.
    pub fn select_weights(&self, signals: &NormalizedSet) -> FusionWeights {
        let faces_reliable = signals.face.reliable()
            && signals
                .face_detection_rate
                .map(|rate| rate > self.detection_rate_threshold)
                .unwrap_or(false);

        if faces_reliable {
            self.reliable_weights
        } else {
            self.degraded_weights
        }
    }

    /// Weighted sum of the three scores.
    pub fn fuse(&self, signals: &NormalizedSet) -> EngineResult<FusionOutcome> {
        let weights = self.select_weights(signals).normalized()?;

        let raw: f64 = SignalKind::ALL
            .iter()
            .map(|kind| weights.get(*kind) * signals.get(*kind).score())
            .sum();
        if !raw.is_finite() {
            return Err(EngineError::internal("fused confidence score is not finite"));
        }
        let confidence_score = round2(clamp_score(raw));

        debug!(
            face_weight = weights.face,
            frame_weight = weights.frame,
            audio_weight = weights.audio,
            confidence_score,
            "Fused signals"
        );

        Ok(FusionOutcome {
            weights,
            confidence_score,
        })
    }
}
