//! Structured analysis logging.
//!
//! Tags lifecycle events with the analysis ID so one call can be followed
//! through interleaved concurrent analyses.

use tracing::{error, info, warn, Span};

use deepscan_models::AnalysisId;

/// Logger for one analysis call.
#[derive(Debug, Clone)]
pub struct AnalysisLogger {
    analysis_id: String,
    video: String,
}

impl AnalysisLogger {
    /// Create a logger for one analysis call.
    ///
    /// # Arguments
    /// * `analysis_id` - The identifier stamped on the report
    /// * `video` - Display form of the video path
    pub fn new(analysis_id: &AnalysisId, video: &str) -> Self {
        Self {
            analysis_id: analysis_id.to_string(),
            video: video.to_string(),
        }
    }

    /// Log the start of an analysis.
    pub fn log_start(&self, message: &str) {
        info!(
            analysis_id = %self.analysis_id,
            video = %self.video,
            "Analysis started: {}", message
        );
    }

    /// Log a pipeline stage finishing.
    pub fn log_progress(&self, message: &str) {
        info!(
            analysis_id = %self.analysis_id,
            "Analysis progress: {}", message
        );
    }

    /// Log a degraded signal or other recoverable problem.
    pub fn log_warning(&self, message: &str) {
        warn!(
            analysis_id = %self.analysis_id,
            "Analysis warning: {}", message
        );
    }

    /// Log the error that ends an analysis with a failed report.
    pub fn log_error(&self, message: &str) {
        error!(
            analysis_id = %self.analysis_id,
            video = %self.video,
            "Analysis failed: {}", message
        );
    }

    /// Log a successful analysis with its headline result.
    pub fn log_completion(&self, message: &str) {
        info!(
            analysis_id = %self.analysis_id,
            "Analysis completed: {}", message
        );
    }

    /// The analysis ID this logger tags events with.
    pub fn analysis_id(&self) -> &str {
        &self.analysis_id
    }

    /// Span wrapping the whole analysis call.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "analysis",
            analysis_id = %self.analysis_id,
            video = %self.video
        )
    }
}
