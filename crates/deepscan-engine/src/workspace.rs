//! Per-analysis scratch directory.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

/// Scratch space for decoded frames and extracted audio.
///
/// Removed by `close`, or on drop if `close` was never reached.
#[derive(Debug)]
pub struct AnalysisWorkspace {
    dir: TempDir,
}

impl AnalysisWorkspace {
    /// Create a fresh directory under `parent` (system temp dir if `None`).
    pub fn create(parent: Option<&Path>, analysis_id: &str) -> std::io::Result<Self> {
        let prefix = format!("deepscan-{}-", analysis_id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };

        debug!(path = %dir.path().display(), "Created analysis workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Delete the directory. Failures are logged, never raised.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Removed analysis workspace"),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove analysis workspace"
            ),
        }
    }
}
