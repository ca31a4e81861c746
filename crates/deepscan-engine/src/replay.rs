//! Analyzer that replays previously recorded output.
//!
//! Used to rescore stored analyzer results without decoding the video
//! again, and as a deterministic stand-in for real detectors.

use std::time::Duration;

use async_trait::async_trait;

use deepscan_models::{AnalyzerPayload, SignalKind, VideoHandle};

use crate::analyzer::{Analyzer, AnalyzerContext};
use crate::error::AnalyzerError;

/// Replays a fixed payload or error for one signal.
#[derive(Debug, Clone)]
pub struct ReplayAnalyzer {
    kind: SignalKind,
    recorded: Result<AnalyzerPayload, String>,
    delay: Option<Duration>,
}

impl ReplayAnalyzer {
    /// Replay a successful result.
    pub fn payload(kind: SignalKind, payload: AnalyzerPayload) -> Self {
        Self {
            kind,
            recorded: Ok(payload),
            delay: None,
        }
    }

    /// Replay a recorded failure.
    pub fn error(kind: SignalKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            recorded: Err(message.into()),
            delay: None,
        }
    }

    /// Wait before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Analyzer for ReplayAnalyzer {
    fn name(&self) -> &'static str {
        match self.kind {
            SignalKind::Face => "face_replay",
            SignalKind::Frame => "frame_replay",
            SignalKind::Audio => "audio_replay",
        }
    }

    fn kind(&self) -> SignalKind {
        self.kind
    }

    async fn analyze(
        &self,
        _video: &VideoHandle,
        ctx: &AnalyzerContext,
    ) -> Result<AnalyzerPayload, AnalyzerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if ctx.is_cancelled() {
            return Err(AnalyzerError::Cancelled);
        }
        self.recorded.clone().map_err(AnalyzerError::Failed)
    }
}
