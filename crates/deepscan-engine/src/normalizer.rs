//! Signal normalization.
//!
//! Maps each analyzer's raw counters onto a quality score in `[0, 100]`
//! (higher = more authentic-looking):
//!
//! - **Face**: `100 * (1 - distorted_faces / max(total_frames, 1)) * face_detection_rate`
//! - **Frame**: `100 * (1 - abnormal_frames / max(total_frames_processed, 1))`
//! - **Audio**: `100 * (w_cos * cos + w_mis * (1 - mismatch) + w_euc * (1 - euclidean))`
//!
//! Timeouts, failures, zero-frame payloads and missing fields all produce a
//! fallback score flagged `reliable = false`, so fusion always receives a
//! complete triple.

use deepscan_models::{
    clamp_score, clamp_unit, AnalyzerOutcome, AnalyzerPayload, NormalizedSignal, SignalKind,
    WeightsError,
};

/// Fallback when the facial signal is unusable.
pub const FACE_FALLBACK_SCORE: f64 = 0.0;
/// Fallback when the frame signal is unusable.
pub const FRAME_FALLBACK_SCORE: f64 = 0.0;
/// Fallback when the audio-visual signal is unusable.
pub const AUDIO_FALLBACK_SCORE: f64 = 0.0;

/// Payload field names.
pub mod fields {
    pub const TOTAL_FRAMES: &str = "total_frames";
    pub const DISTORTED_FACES: &str = "distorted_faces";
    pub const FACE_DETECTION_RATE: &str = "face_detection_rate";
    pub const TOTAL_FRAMES_PROCESSED: &str = "total_frames_processed";
    pub const ABNORMAL_FRAMES: &str = "abnormal_frames";
    pub const ABNORMAL_FRAMES_DETECTED: &str = "abnormal_frames_detected";
    pub const COSINE_SIMILARITY: &str = "cosine_similarity";
    pub const MISMATCH_SCORE: &str = "mismatch_score";
    pub const EUCLIDEAN_DISTANCE: &str = "euclidean_distance";
}

/// Sub-weights of the audio-visual score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSubWeights {
    pub cosine: f64,
    pub mismatch: f64,
    pub euclidean: f64,
}

impl Default for AudioSubWeights {
    fn default() -> Self {
        Self {
            cosine: 0.4,
            mismatch: 0.4,
            euclidean: 0.2,
        }
    }
}

impl AudioSubWeights {
    /// Equal-thirds variant.
    pub const EQUAL: AudioSubWeights = AudioSubWeights {
        cosine: 1.0 / 3.0,
        mismatch: 1.0 / 3.0,
        euclidean: 1.0 / 3.0,
    };

    /// Validate and rescale so the sub-weights sum to 1.0.
    pub fn normalized(self) -> Result<Self, WeightsError> {
        for (name, value) in [
            ("cosine", self.cosine),
            ("mismatch", self.mismatch),
            ("euclidean", self.euclidean),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(WeightsError::InvalidWeight(name));
            }
        }
        let total = self.cosine + self.mismatch + self.euclidean;
        if total <= 0.0 {
            return Err(WeightsError::ZeroSum);
        }
        Ok(Self {
            cosine: self.cosine / total,
            mismatch: self.mismatch / total,
            euclidean: self.euclidean / total,
        })
    }
}

/// Normalized signal plus the reason it was degraded, if it was.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSignal {
    pub signal: NormalizedSignal,
    pub note: Option<String>,
}

impl ScoredSignal {
    fn measured(kind: SignalKind, score: f64) -> Self {
        Self {
            signal: NormalizedSignal::reliable(kind, clamp_score(score)),
            note: None,
        }
    }

    fn fallback(kind: SignalKind, score: f64, note: impl Into<String>) -> Self {
        Self {
            signal: NormalizedSignal::fallback(kind, score),
            note: Some(note.into()),
        }
    }

    pub fn score(&self) -> f64 {
        self.signal.score
    }

    pub fn reliable(&self) -> bool {
        self.signal.reliable
    }
}

/// The complete triple handed to the fusion policy.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSet {
    pub face: ScoredSignal,
    pub frame: ScoredSignal,
    pub audio: ScoredSignal,
    /// Fraction of sampled frames with a detected face, when some analyzer reported it
    pub face_detection_rate: Option<f64>,
    /// Interpretation of the mismatch score, when the audio signal succeeded
    pub audio_summary: Option<String>,
}

impl NormalizedSet {
    pub fn get(&self, kind: SignalKind) -> &ScoredSignal {
        match kind {
            SignalKind::Face => &self.face,
            SignalKind::Frame => &self.frame,
            SignalKind::Audio => &self.audio,
        }
    }
}

/// Converts analyzer outcomes into normalized signals.
#[derive(Debug, Clone)]
pub struct SignalNormalizer {
    audio_weights: AudioSubWeights,
}

impl Default for SignalNormalizer {
    fn default() -> Self {
        Self {
            audio_weights: AudioSubWeights::default(),
        }
    }
}

impl SignalNormalizer {
    pub fn new(audio_weights: AudioSubWeights) -> Result<Self, WeightsError> {
        Ok(Self {
            audio_weights: audio_weights.normalized()?,
        })
    }

    /// Normalize all three outcomes. Never fails.
    pub fn normalize(
        &self,
        face: &AnalyzerOutcome,
        frame: &AnalyzerOutcome,
        audio: &AnalyzerOutcome,
    ) -> NormalizedSet {
        let face_detection_rate = face_rate(face, Some(audio));

        NormalizedSet {
            face: self.normalize_face(face, face_detection_rate),
            frame: self.normalize_frame(frame),
            audio: self.normalize_audio(audio),
            face_detection_rate,
            audio_summary: audio
                .payload()
                .and_then(|p| p.get(fields::MISMATCH_SCORE))
                .filter(|m| m.is_finite())
                .map(|m| alignment_summary(m).to_string()),
        }
    }

    /// Normalize a single outcome without the full triple. A face outcome
    /// borrows the detection rate from `audio` exactly as `normalize` does.
    pub fn normalize_one(
        &self,
        kind: SignalKind,
        outcome: &AnalyzerOutcome,
        audio: Option<&AnalyzerOutcome>,
    ) -> ScoredSignal {
        match kind {
            SignalKind::Face => self.normalize_face(outcome, face_rate(outcome, audio)),
            SignalKind::Frame => self.normalize_frame(outcome),
            SignalKind::Audio => self.normalize_audio(outcome),
        }
    }

    /// Face-distortion quality. `detection_rate` may come from another analyzer.
    pub fn normalize_face(
        &self,
        outcome: &AnalyzerOutcome,
        detection_rate: Option<f64>,
    ) -> ScoredSignal {
        let kind = SignalKind::Face;
        let payload = match outcome {
            AnalyzerOutcome::Success { payload } => payload,
            other => return unavailable(kind, FACE_FALLBACK_SCORE, other),
        };

        let total = payload.count(fields::TOTAL_FRAMES);
        if total <= 0.0 {
            return ScoredSignal::fallback(kind, FACE_FALLBACK_SCORE, "No frames examined");
        }
        let Some(rate) = detection_rate else {
            return ScoredSignal::fallback(
                kind,
                FACE_FALLBACK_SCORE,
                "Face detection rate unavailable",
            );
        };

        let distorted_ratio = clamp_unit(payload.count(fields::DISTORTED_FACES) / total.max(1.0));
        ScoredSignal::measured(kind, 100.0 * (1.0 - distorted_ratio) * clamp_unit(rate))
    }

    /// Frame-anomaly quality.
    pub fn normalize_frame(&self, outcome: &AnalyzerOutcome) -> ScoredSignal {
        let kind = SignalKind::Frame;
        let payload = match outcome {
            AnalyzerOutcome::Success { payload } => payload,
            other => return unavailable(kind, FRAME_FALLBACK_SCORE, other),
        };

        let total = payload.count_any(&[fields::TOTAL_FRAMES_PROCESSED, fields::TOTAL_FRAMES]);
        if total <= 0.0 {
            return ScoredSignal::fallback(kind, FRAME_FALLBACK_SCORE, "No frames processed");
        }

        let abnormal =
            payload.count_any(&[fields::ABNORMAL_FRAMES, fields::ABNORMAL_FRAMES_DETECTED]);
        let abnormal_ratio = clamp_unit(abnormal / total.max(1.0));
        ScoredSignal::measured(kind, 100.0 * (1.0 - abnormal_ratio))
    }

    /// Audio-visual alignment quality.
    pub fn normalize_audio(&self, outcome: &AnalyzerOutcome) -> ScoredSignal {
        let kind = SignalKind::Audio;
        let payload = match outcome {
            AnalyzerOutcome::Success { payload } => payload,
            other => return unavailable(kind, AUDIO_FALLBACK_SCORE, other),
        };

        let mut values = [0.0; 3];
        for (slot, name) in values.iter_mut().zip([
            fields::COSINE_SIMILARITY,
            fields::MISMATCH_SCORE,
            fields::EUCLIDEAN_DISTANCE,
        ]) {
            match payload.get(name) {
                Some(v) if v.is_finite() => *slot = v,
                Some(_) => {
                    return ScoredSignal::fallback(
                        kind,
                        AUDIO_FALLBACK_SCORE,
                        format!("Non-finite {}", name),
                    )
                }
                None => {
                    return ScoredSignal::fallback(
                        kind,
                        AUDIO_FALLBACK_SCORE,
                        format!("Missing field: {}", name),
                    )
                }
            }
        }
        let [cosine, mismatch, euclidean] = values;

        let w = &self.audio_weights;
        let quality = w.cosine * clamp_unit(cosine)
            + w.mismatch * clamp_unit(1.0 - mismatch)
            + w.euclidean * clamp_unit(1.0 - euclidean);
        ScoredSignal::measured(kind, 100.0 * quality)
    }
}

/// Interpretation of an audio-visual mismatch score.
pub fn alignment_summary(mismatch_score: f64) -> &'static str {
    if mismatch_score < 0.5 {
        "Audio and visual content are well-aligned."
    } else if mismatch_score < 0.7 {
        "Potential audio-visual misalignment detected."
    } else {
        "Significant audio-visual misalignment detected."
    }
}

fn unavailable(kind: SignalKind, fallback: f64, outcome: &AnalyzerOutcome) -> ScoredSignal {
    let note = outcome
        .error_message()
        .unwrap_or_else(|| "Analyzer unavailable".to_string());
    ScoredSignal::fallback(kind, fallback, note)
}

/// Detection rate from the face payload, else from the audio payload.
fn face_rate(face: &AnalyzerOutcome, audio: Option<&AnalyzerOutcome>) -> Option<f64> {
    detection_rate(face.payload()).or_else(|| detection_rate(audio.and_then(|a| a.payload())))
}

fn detection_rate(payload: Option<&AnalyzerPayload>) -> Option<f64> {
    payload
        .and_then(|p| p.get(fields::FACE_DETECTION_RATE))
        .filter(|rate| rate.is_finite())
        .map(clamp_unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(payload: AnalyzerPayload) -> AnalyzerOutcome {
        AnalyzerOutcome::success(payload)
    }

    fn face_payload(total: f64, distorted: f64, rate: f64) -> AnalyzerPayload {
        AnalyzerPayload::new()
            .with(fields::TOTAL_FRAMES, total)
            .with(fields::DISTORTED_FACES, distorted)
            .with(fields::FACE_DETECTION_RATE, rate)
    }

    fn audio_payload(cos: f64, mis: f64, euc: f64) -> AnalyzerPayload {
        AnalyzerPayload::new()
            .with(fields::COSINE_SIMILARITY, cos)
            .with(fields::MISMATCH_SCORE, mis)
            .with(fields::EUCLIDEAN_DISTANCE, euc)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_face_score() {
        let normalizer = SignalNormalizer::default();
        let outcome = success(face_payload(100.0, 2.0, 0.9));

        let scored = normalizer.normalize_face(&outcome, Some(0.9));
        assert!(scored.reliable());
        assert_close(scored.score(), 88.2);
    }

    #[test]
    fn test_face_zero_frames_falls_back() {
        let normalizer = SignalNormalizer::default();
        let outcome = success(face_payload(0.0, 0.0, 1.0));

        let scored = normalizer.normalize_face(&outcome, Some(1.0));
        assert!(!scored.reliable());
        assert_eq!(scored.score(), FACE_FALLBACK_SCORE);
        assert_eq!(scored.note.as_deref(), Some("No frames examined"));
    }

    #[test]
    fn test_face_ratio_clamped() {
        let normalizer = SignalNormalizer::default();
        let outcome = success(face_payload(10.0, 25.0, 1.0));

        let scored = normalizer.normalize_face(&outcome, Some(1.0));
        assert!(scored.reliable());
        assert_eq!(scored.score(), 0.0);
    }

    #[test]
    fn test_face_rate_borrowed_from_audio() {
        let normalizer = SignalNormalizer::default();
        let face = success(
            AnalyzerPayload::new()
                .with(fields::TOTAL_FRAMES, 50.0)
                .with(fields::DISTORTED_FACES, 0.0),
        );
        let audio = success(audio_payload(0.9, 0.1, 0.1).with(fields::FACE_DETECTION_RATE, 0.4));
        let frame = success(
            AnalyzerPayload::new()
                .with(fields::TOTAL_FRAMES_PROCESSED, 10.0)
                .with(fields::ABNORMAL_FRAMES, 0.0),
        );

        let set = normalizer.normalize(&face, &frame, &audio);
        assert_eq!(set.face_detection_rate, Some(0.4));
        assert_close(set.face.score(), 40.0);
    }

    #[test]
    fn test_single_face_outcome_borrows_audio_rate() {
        let normalizer = SignalNormalizer::default();
        let face = success(
            AnalyzerPayload::new()
                .with(fields::TOTAL_FRAMES, 50.0)
                .with(fields::DISTORTED_FACES, 0.0),
        );
        let audio = success(audio_payload(0.9, 0.1, 0.1).with(fields::FACE_DETECTION_RATE, 0.4));

        let alone = normalizer.normalize_one(SignalKind::Face, &face, None);
        assert!(!alone.reliable());

        let scored = normalizer.normalize_one(SignalKind::Face, &face, Some(&audio));
        assert!(scored.reliable());
        assert_close(scored.score(), 40.0);

        let own = success(face_payload(50.0, 0.0, 0.8));
        let scored = normalizer.normalize_one(SignalKind::Face, &own, Some(&audio));
        assert_close(scored.score(), 80.0);
    }

    #[test]
    fn test_face_without_rate_is_unreliable() {
        let normalizer = SignalNormalizer::default();
        let face = success(AnalyzerPayload::new().with(fields::TOTAL_FRAMES, 50.0));

        let scored = normalizer.normalize_face(&face, None);
        assert!(!scored.reliable());
        assert_eq!(scored.score(), FACE_FALLBACK_SCORE);
    }

    #[test]
    fn test_frame_score_and_aliases() {
        let normalizer = SignalNormalizer::default();
        let outcome = success(
            AnalyzerPayload::new()
                .with(fields::TOTAL_FRAMES_PROCESSED, 50.0)
                .with(fields::ABNORMAL_FRAMES_DETECTED, 5.0),
        );

        let scored = normalizer.normalize_frame(&outcome);
        assert!(scored.reliable());
        assert_close(scored.score(), 90.0);
    }

    #[test]
    fn test_frame_zero_denominator() {
        let normalizer = SignalNormalizer::default();
        let outcome = success(
            AnalyzerPayload::new()
                .with(fields::TOTAL_FRAMES_PROCESSED, 0.0)
                .with(fields::ABNORMAL_FRAMES, 3.0),
        );

        let scored = normalizer.normalize_frame(&outcome);
        assert!(!scored.reliable());
        assert!((0.0..=100.0).contains(&scored.score()));
    }

    #[test]
    fn test_audio_score() {
        let normalizer = SignalNormalizer::default();
        let scored = normalizer.normalize_audio(&success(audio_payload(0.9, 0.1, 0.1)));
        assert!(scored.reliable());
        assert_close(scored.score(), 90.0);
    }

    #[test]
    fn test_audio_terms_clamped() {
        let normalizer = SignalNormalizer::default();
        // Cosine below zero and distance above one must not push the score negative.
        let scored = normalizer.normalize_audio(&success(audio_payload(-0.8, 1.8, 1.9)));
        assert!(scored.reliable());
        assert_eq!(scored.score(), 0.0);

        let scored = normalizer.normalize_audio(&success(audio_payload(1.0, -0.5, -0.2)));
        assert_close(scored.score(), 100.0);
    }

    #[test]
    fn test_audio_missing_or_nan_falls_back() {
        let normalizer = SignalNormalizer::default();

        let missing = success(AnalyzerPayload::new().with(fields::COSINE_SIMILARITY, 0.9));
        let scored = normalizer.normalize_audio(&missing);
        assert!(!scored.reliable());
        assert_eq!(scored.note.as_deref(), Some("Missing field: mismatch_score"));

        let nan = success(audio_payload(f64::NAN, 0.1, 0.1));
        assert!(!normalizer.normalize_audio(&nan).reliable());
    }

    #[test]
    fn test_equal_sub_weights() {
        let normalizer = SignalNormalizer::new(AudioSubWeights::EQUAL).unwrap();
        let scored = normalizer.normalize_audio(&success(audio_payload(0.6, 0.3, 0.3)));
        assert_close(scored.score(), (0.6 + 0.7 + 0.7) / 3.0 * 100.0);
    }

    #[test]
    fn test_timeout_and_failure_fall_back() {
        let normalizer = SignalNormalizer::default();
        let set = normalizer.normalize(
            &AnalyzerOutcome::Timeout,
            &AnalyzerOutcome::failure("codec missing"),
            &AnalyzerOutcome::failure("no audio stream"),
        );

        for kind in SignalKind::ALL {
            assert!(!set.get(*kind).reliable());
            assert_eq!(set.get(*kind).score(), 0.0);
        }
        assert_eq!(set.face.note.as_deref(), Some("Analysis timed out"));
        assert_eq!(set.frame.note.as_deref(), Some("codec missing"));
        assert!(set.face_detection_rate.is_none());
        assert!(set.audio_summary.is_none());
    }

    #[test]
    fn test_scores_bounded_for_odd_payloads() {
        let normalizer = SignalNormalizer::default();
        let payloads = [
            AnalyzerPayload::new(),
            face_payload(f64::INFINITY, 1.0, 2.0),
            face_payload(-4.0, -1.0, -1.0),
            face_payload(1.0, f64::NAN, 0.5),
            audio_payload(5.0, -5.0, -5.0),
        ];

        for payload in payloads {
            let outcome = success(payload);
            for scored in [
                normalizer.normalize_face(&outcome, detection_rate(outcome.payload())),
                normalizer.normalize_frame(&outcome),
                normalizer.normalize_audio(&outcome),
            ] {
                assert!(
                    (0.0..=100.0).contains(&scored.score()),
                    "score {} out of range",
                    scored.score()
                );
            }
        }
    }

    #[test]
    fn test_alignment_summary_bands() {
        assert_eq!(alignment_summary(0.1), "Audio and visual content are well-aligned.");
        assert_eq!(alignment_summary(0.5), "Potential audio-visual misalignment detected.");
        assert_eq!(alignment_summary(0.7), "Significant audio-visual misalignment detected.");
    }
}
