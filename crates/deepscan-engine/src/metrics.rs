//! Engine metrics.
//!
//! Emitted through the `metrics` facade; the embedding process decides
//! whether and where they are exported.

use metrics::{counter, histogram};

use deepscan_models::{AnalysisStatus, OutcomeKind};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Analyzer calls by analyzer and outcome.
    pub const ANALYZER_RUNS_TOTAL: &str = "deepscan_analyzer_runs_total";

    /// Analyzer call duration in seconds by analyzer.
    pub const ANALYZER_DURATION_SECONDS: &str = "deepscan_analyzer_duration_seconds";

    /// Completed analyses by status.
    pub const ANALYSES_TOTAL: &str = "deepscan_analyses_total";

    /// End-to-end analysis duration in seconds.
    pub const ANALYSIS_DURATION_SECONDS: &str = "deepscan_analysis_duration_seconds";

    /// Distribution of fused confidence scores.
    pub const CONFIDENCE_SCORE: &str = "deepscan_confidence_score";
}

// =============================================================================
// Recording Functions
// =============================================================================

fn outcome_label(outcome: OutcomeKind) -> &'static str {
    match outcome {
        OutcomeKind::Success => "success",
        OutcomeKind::Timeout => "timeout",
        OutcomeKind::Failure => "failure",
    }
}

fn status_label(status: AnalysisStatus) -> &'static str {
    match status {
        AnalysisStatus::Ok => "ok",
        AnalysisStatus::Failed => "failed",
    }
}

/// Record one bounded analyzer call.
pub fn record_analyzer_run(analyzer: &str, outcome: OutcomeKind, duration_secs: f64) {
    counter!(
        names::ANALYZER_RUNS_TOTAL,
        "analyzer" => analyzer.to_string(),
        "outcome" => outcome_label(outcome)
    )
    .increment(1);

    histogram!(
        names::ANALYZER_DURATION_SECONDS,
        "analyzer" => analyzer.to_string()
    )
    .record(duration_secs);
}

/// Record a finished analysis. The confidence score is only recorded for
/// successful reports.
pub fn record_analysis(status: AnalysisStatus, duration_secs: f64, confidence_score: f64) {
    counter!(
        names::ANALYSES_TOTAL,
        "status" => status_label(status)
    )
    .increment(1);

    histogram!(names::ANALYSIS_DURATION_SECONDS).record(duration_secs);

    if status == AnalysisStatus::Ok {
        histogram!(names::CONFIDENCE_SCORE).record(confidence_score);
    }
}

// =============================================================================
// Tests
// =============================================================================
