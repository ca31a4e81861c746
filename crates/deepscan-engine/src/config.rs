//! Engine configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use deepscan_models::{AnalysisQuality, FusionWeights, SignalKind};

use crate::error::{EngineError, EngineResult};
use crate::normalizer::AudioSubWeights;

const MB: u64 = 1024 * 1024;

/// Frame-sampling stride handed to each analyzer (analyze every n-th frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingConfig {
    pub face: u32,
    pub frame: u32,
    /// The lip-sync stage needs contiguous frames
    pub audio: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            face: 5,
            frame: 5,
            audio: 1,
        }
    }
}

impl SamplingConfig {
    /// Apply a quality preset to the visual analyzers.
    pub fn with_quality(self, quality: AnalysisQuality) -> Self {
        let stride = quality.frame_stride();
        Self {
            face: stride,
            frame: stride,
            ..self
        }
    }

    pub fn stride_for(&self, kind: SignalKind) -> u32 {
        match kind {
            SignalKind::Face => self.face,
            SignalKind::Frame => self.frame,
            SignalKind::Audio => self.audio,
        }
    }
}

/// Deadlines for one analysis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutBudget {
    /// Per-analyzer deadline
    pub analyzer: Duration,
    /// Whole-pipeline deadline
    pub pipeline: Duration,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Inputs above this size are rejected before analysis
    pub max_file_size_bytes: u64,
    /// Inputs above this size get the large-file timeouts
    pub large_file_threshold_bytes: u64,
    pub analyzer_timeout: Duration,
    pub analyzer_timeout_large: Duration,
    pub pipeline_timeout: Duration,
    pub pipeline_timeout_large: Duration,
    /// Upper bound on an analyzer's release hook after a timeout
    pub release_timeout: Duration,
    /// Maximum analyzer calls in flight per engine
    pub max_parallel_analyzers: usize,
    /// Run the three analyzers concurrently (otherwise face, frame, audio in order)
    pub run_concurrently: bool,
    pub sampling: SamplingConfig,
    /// Parent directory for per-analysis scratch space (system temp dir if unset)
    pub work_dir: Option<PathBuf>,
    /// Reject containers outside the supported extension list
    pub enforce_extension: bool,
    pub audio_weights: AudioSubWeights,
    /// Weights used when faces are detected reliably
    pub reliable_weights: FusionWeights,
    /// Weights used when the facial signal is untrustworthy
    pub degraded_weights: FusionWeights,
    /// Detection rate above which the facial signal counts as reliable
    pub detection_rate_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 100 * MB,
            large_file_threshold_bytes: 50 * MB,
            analyzer_timeout: Duration::from_secs(60),
            analyzer_timeout_large: Duration::from_secs(90),
            pipeline_timeout: Duration::from_secs(120),
            pipeline_timeout_large: Duration::from_secs(180),
            release_timeout: Duration::from_secs(5),
            max_parallel_analyzers: 3,
            run_concurrently: true,
            sampling: SamplingConfig::default(),
            work_dir: None,
            enforce_extension: false,
            audio_weights: AudioSubWeights::default(),
            reliable_weights: FusionWeights::RELIABLE_FACE,
            degraded_weights: FusionWeights::DEGRADED_FACE,
            detection_rate_threshold: 0.5,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let sampling = SamplingConfig {
            face: env_or("DEEPSCAN_FRAME_STRIDE", defaults.sampling.face),
            frame: env_or("DEEPSCAN_FRAME_STRIDE", defaults.sampling.frame),
            audio: defaults.sampling.audio,
        };
        let sampling = match std::env::var("DEEPSCAN_QUALITY").ok().and_then(|s| s.parse().ok()) {
            Some(quality) => sampling.with_quality(quality),
            None => sampling,
        };

        Self {
            max_file_size_bytes: megabytes(env_or("DEEPSCAN_MAX_FILE_SIZE_MB", 100)),
            large_file_threshold_bytes: megabytes(env_or("DEEPSCAN_LARGE_FILE_MB", 50)),
            analyzer_timeout: Duration::from_secs(env_or("DEEPSCAN_ANALYZER_TIMEOUT_SECS", 60)),
            analyzer_timeout_large: Duration::from_secs(env_or(
                "DEEPSCAN_ANALYZER_TIMEOUT_LARGE_SECS",
                90,
            )),
            pipeline_timeout: Duration::from_secs(env_or("DEEPSCAN_PIPELINE_TIMEOUT_SECS", 120)),
            pipeline_timeout_large: Duration::from_secs(env_or(
                "DEEPSCAN_PIPELINE_TIMEOUT_LARGE_SECS",
                180,
            )),
            max_parallel_analyzers: env_or(
                "DEEPSCAN_MAX_PARALLEL_ANALYZERS",
                defaults.max_parallel_analyzers,
            ),
            sampling,
            work_dir: std::env::var("DEEPSCAN_WORK_DIR").ok().map(PathBuf::from),
            enforce_extension: env_or("DEEPSCAN_ENFORCE_EXTENSION", false),
            ..defaults
        }
    }

    /// Apply a sampling quality preset.
    pub fn with_quality(mut self, quality: AnalysisQuality) -> Self {
        self.sampling = self.sampling.with_quality(quality);
        self
    }

    /// Timeouts scale with input size.
    pub fn timeouts_for(&self, size_bytes: u64) -> TimeoutBudget {
        if size_bytes > self.large_file_threshold_bytes {
            TimeoutBudget {
                analyzer: self.analyzer_timeout_large,
                pipeline: self.pipeline_timeout_large,
            }
        } else {
            TimeoutBudget {
                analyzer: self.analyzer_timeout,
                pipeline: self.pipeline_timeout,
            }
        }
    }

    /// Maximum input size in whole megabytes, as shown in error messages.
    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_bytes / MB
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.max_parallel_analyzers == 0 {
            return Err(EngineError::invalid_config(
                "max_parallel_analyzers must be at least 1",
            ));
        }
        if self.sampling.face == 0 || self.sampling.frame == 0 || self.sampling.audio == 0 {
            return Err(EngineError::invalid_config("frame strides must be at least 1"));
        }
        if self.analyzer_timeout.is_zero() || self.pipeline_timeout.is_zero() {
            return Err(EngineError::invalid_config("timeouts must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.detection_rate_threshold) {
            return Err(EngineError::invalid_config(
                "detection_rate_threshold must be within [0, 1]",
            ));
        }
        self.reliable_weights.normalized()?;
        self.degraded_weights.normalized()?;
        self.audio_weights.normalized()?;
        Ok(())
    }
}

/// Megabytes to bytes, saturating at `u64::MAX`.
fn megabytes(mb: u64) -> u64 {
    mb.saturating_mul(MB)
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
