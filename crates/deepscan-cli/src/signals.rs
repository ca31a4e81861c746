//! Recorded analyzer results.
//!
//! A signals file holds the raw counters each analyzer produced for one
//! video, keyed by signal:
//!
//! ```json
//! {
//!   "face":  { "total_frames": 100, "distorted_faces": 2, "face_detection_rate": 0.9 },
//!   "frame": { "total_frames_processed": 50, "abnormal_frames": 5 },
//!   "audio": { "error": "no audio stream" }
//! }
//! ```
//!
//! A missing entry or an `{"error": ...}` object replays as a failed
//! analyzer.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use deepscan_engine::{Analyzer, ReplayAnalyzer};
use deepscan_models::{AnalyzerPayload, SignalKind};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RecordedSignal {
    Error { error: String },
    Counters(BTreeMap<String, f64>),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordedSignals {
    #[serde(default)]
    pub face: Option<RecordedSignal>,
    #[serde(default)]
    pub frame: Option<RecordedSignal>,
    #[serde(default)]
    pub audio: Option<RecordedSignal>,
}

impl RecordedSignals {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid signals document")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read signals file {}", path.display()))?;
        Self::from_json(&json)
    }

    fn get(&self, kind: SignalKind) -> Option<&RecordedSignal> {
        match kind {
            SignalKind::Face => self.face.as_ref(),
            SignalKind::Frame => self.frame.as_ref(),
            SignalKind::Audio => self.audio.as_ref(),
        }
    }

    /// One replay analyzer per signal.
    pub fn into_analyzers(self) -> Vec<Arc<dyn Analyzer>> {
        SignalKind::ALL
            .iter()
            .map(|kind| {
                let analyzer = match self.get(*kind) {
                    Some(RecordedSignal::Counters(fields)) => {
                        ReplayAnalyzer::payload(*kind, AnalyzerPayload::from(fields.clone()))
                    }
                    Some(RecordedSignal::Error { error }) => {
                        ReplayAnalyzer::error(*kind, error.clone())
                    }
                    None => ReplayAnalyzer::error(
                        *kind,
                        format!("No recorded result for {} analyzer", kind),
                    ),
                };
                Arc::new(analyzer) as Arc<dyn Analyzer>
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_counters_and_errors() {
        let signals = RecordedSignals::from_json(
            r#"{
                "face": {"total_frames": 100, "distorted_faces": 2, "face_detection_rate": 0.9},
                "audio": {"error": "no audio stream"}
            }"#,
        )
        .unwrap();

        match signals.face.as_ref().unwrap() {
            RecordedSignal::Counters(fields) => assert_eq!(fields["total_frames"], 100.0),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            signals.audio,
            Some(RecordedSignal::Error {
                error: "no audio stream".to_string()
            })
        );
        assert!(signals.frame.is_none());
    }

    #[test]
    fn test_one_analyzer_per_signal() {
        let analyzers = RecordedSignals::default().into_analyzers();
        let kinds: Vec<_> = analyzers.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, SignalKind::ALL.to_vec());
    }

    #[test]
    fn test_rejects_malformed_documents() {
        assert!(RecordedSignals::from_json(r#"{"face": {"total_frames": "many"}}"#).is_err());
        assert!(RecordedSignals::from_json(r#"{"voice": {}}"#).is_err());
        assert!(RecordedSignals::from_json("not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, r#"{"frame": {"total_frames_processed": 10}}"#).unwrap();

        let signals = RecordedSignals::load(&path).unwrap();
        assert!(signals.frame.is_some());
        assert!(RecordedSignals::load(&dir.path().join("missing.json")).is_err());
    }
}
