//! Error types for the analysis engine.

use std::path::PathBuf;
use thiserror::Error;

use deepscan_models::WeightsError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors an analyzer may return. Always absorbed by the executor.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("{0}")]
    Failed(String),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyzerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Input rejected before any analyzer runs.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Video file not found")]
    NotFound(PathBuf),

    #[error("Video file is empty")]
    Empty(PathBuf),

    #[error("Video file too large (max {max_mb}MB)")]
    TooLarge { size_bytes: u64, max_mb: u64 },

    #[error("Invalid video path")]
    InvalidPath(String),

    #[error("Unsupported video format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end an analysis call with a failed report.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Analysis timed out after {0} seconds")]
    PipelineTimeout(f64),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid configuration: {0}")]
    Weights(#[from] WeightsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Input(_) => "input",
            EngineError::PipelineTimeout(_) => "pipeline_timeout",
            EngineError::Internal(_) | EngineError::Io(_) => "internal",
            EngineError::InvalidConfig(_) | EngineError::Weights(_) => "config",
        }
    }
}
