//! Input validation.
//!
//! Runs before any analyzer is scheduled. A rejected input never reaches
//! the executor and produces a failed report with a fixed message.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Component, Path};

use tracing::debug;

use deepscan_models::VideoHandle;

use crate::config::EngineConfig;
use crate::error::InputError;

/// Containers accepted by the upload layer.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv"];

/// Pre-analysis checks on a video handle.
#[derive(Debug, Clone)]
pub struct InputGuard {
    max_file_size_bytes: u64,
    max_file_size_mb: u64,
    allowed_extensions: HashSet<String>,
    enforce_extension: bool,
}

impl InputGuard {
    pub fn new(max_file_size_bytes: u64) -> Self {
        Self {
            max_file_size_bytes,
            max_file_size_mb: max_file_size_bytes / (1024 * 1024),
            allowed_extensions: SUPPORTED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            enforce_extension: false,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_file_size_bytes).with_enforce_extension(config.enforce_extension)
    }

    /// Reject containers outside `SUPPORTED_EXTENSIONS` in `inspect`.
    pub fn with_enforce_extension(mut self, enforce: bool) -> Self {
        self.enforce_extension = enforce;
        self
    }

    /// Validate the path shape without touching the filesystem.
    pub fn check_path(&self, path: &Path) -> Result<(), InputError> {
        let display = path.to_string_lossy();
        if display.is_empty() {
            return Err(InputError::InvalidPath("empty path".to_string()));
        }
        if display.contains('\0') {
            return Err(InputError::InvalidPath("path contains null bytes".to_string()));
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(InputError::InvalidPath(format!(
                "path traversal in {}",
                display
            )));
        }
        Ok(())
    }

    /// Check the container extension against the supported list.
    pub fn check_extension(&self, path: &Path) -> Result<(), InputError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if self.allowed_extensions.contains(&ext) {
            Ok(())
        } else {
            Err(InputError::UnsupportedFormat(ext))
        }
    }

    /// Check a size against the configured maximum.
    pub fn check_size(&self, size_bytes: u64) -> Result<(), InputError> {
        if size_bytes > self.max_file_size_bytes {
            return Err(InputError::TooLarge {
                size_bytes,
                max_mb: self.max_file_size_mb,
            });
        }
        Ok(())
    }

    /// Resolve the handle against the filesystem.
    ///
    /// Returns a handle whose `size_bytes` is the size on disk, which may
    /// differ from what the caller reported.
    pub async fn inspect(&self, video: &VideoHandle) -> Result<VideoHandle, InputError> {
        let path = video.path();
        self.check_path(path)?;

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(InputError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(InputError::Io(e)),
        };
        if !metadata.is_file() {
            return Err(InputError::NotFound(path.to_path_buf()));
        }

        let size_bytes = metadata.len();
        if size_bytes == 0 {
            return Err(InputError::Empty(path.to_path_buf()));
        }
        self.check_size(size_bytes)?;

        if self.enforce_extension {
            self.check_extension(path)?;
        }

        debug!(path = %path.display(), size_bytes, "Input accepted");
        Ok(video.clone().with_size(size_bytes))
    }
}
