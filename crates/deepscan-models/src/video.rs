//! Video handle model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reference to a video resource plus the metadata known at request time.
///
/// A handle is read-only for analyzers; every worker gets its own clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoHandle {
    /// Location of the video file
    pub path: PathBuf,
    /// Size in bytes as reported by the upload layer (re-checked before analysis)
    pub size_bytes: u64,
    /// Duration in seconds, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl VideoHandle {
    /// Create a handle for a path whose size is not yet known.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            size_bytes: 0,
            duration_seconds: None,
        }
    }

    /// Set the size in bytes.
    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    /// Set the duration in seconds.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Size in whole megabytes (floor).
    pub fn size_mb(&self) -> u64 {
        self.size_bytes / (1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_builder() {
        let handle = VideoHandle::new("/tmp/clip.MP4")
            .with_size(3 * 1024 * 1024 + 10)
            .with_duration(12.5);

        assert_eq!(handle.extension().as_deref(), Some("mp4"));
        assert_eq!(handle.size_mb(), 3);
        assert_eq!(handle.duration_seconds, Some(12.5));
    }

    #[test]
    fn test_handle_without_extension() {
        let handle = VideoHandle::new("/tmp/upload");
        assert!(handle.extension().is_none());
        assert_eq!(handle.size_bytes, 0);
    }
}
