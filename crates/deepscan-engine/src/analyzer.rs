//! Analyzer trait and call context.
//!
//! An `Analyzer` is one of the three independent detectors (face distortion,
//! frame anomaly, audio-visual mismatch). The engine only consumes the
//! named counters an analyzer returns; how they are computed is the
//! analyzer's business.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use deepscan_models::{AnalyzerPayload, SignalKind, VideoHandle};

use crate::error::AnalyzerError;

/// Per-call context handed to an analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerContext {
    analysis_id: String,
    frame_stride: u32,
    scratch_dir: PathBuf,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl AnalyzerContext {
    /// Context with no cancellation attached. The executor wires one in for
    /// each bounded call.
    pub fn new(
        analysis_id: impl Into<String>,
        frame_stride: u32,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            analysis_id: analysis_id.into(),
            frame_stride: frame_stride.max(1),
            scratch_dir: scratch_dir.into(),
            cancel_rx: None,
        }
    }

    pub fn analysis_id(&self) -> &str {
        &self.analysis_id
    }

    /// Analyze every n-th frame.
    pub fn frame_stride(&self) -> u32 {
        self.frame_stride
    }

    /// Directory for decoded frames, extracted audio and other transient
    /// artifacts. Removed by the orchestrator when the analysis ends.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// True once the call has been abandoned. Long-running analyzers should
    /// poll this between frames and return `AnalyzerError::Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub(crate) fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }
}

/// Contract every detector satisfies.
///
/// Implementations must be callable from a worker task, must not require
/// interactive input and must treat the video as read-only. CPU-heavy work
/// belongs on `tokio::task::spawn_blocking` inside `analyze`.
#[async_trait]
pub trait Analyzer: Send + Sync + 'static {
    /// Human-readable name for logging and metrics.
    fn name(&self) -> &'static str;

    /// Which signal this analyzer produces.
    fn kind(&self) -> SignalKind;

    /// Examine the video and return named numeric counters.
    async fn analyze(
        &self,
        video: &VideoHandle,
        ctx: &AnalyzerContext,
    ) -> Result<AnalyzerPayload, AnalyzerError>;

    /// Force-release analyzer-owned resources (open decoders, model sessions)
    /// after a call was abandoned on timeout.
    async fn release(&self, _video: &VideoHandle) -> Result<(), AnalyzerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_accessors() {
        let (tx, rx) = watch::channel(false);
        let ctx = AnalyzerContext::new("abc", 0, "/tmp/scratch");
        assert!(!ctx.is_cancelled());

        let ctx = ctx.with_cancel(rx);

        assert_eq!(ctx.analysis_id(), "abc");
        assert_eq!(ctx.frame_stride(), 1);
        assert_eq!(ctx.scratch_dir(), Path::new("/tmp/scratch"));
        assert!(!ctx.is_cancelled());

        tx.send(true).unwrap();
        assert!(ctx.is_cancelled());
    }
}
