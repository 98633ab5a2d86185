//! Per-job scratch directory
//!
//! A `ScratchSpace` owns one temporary directory for the lifetime of a job. The
//! directory is removed when the value is closed or dropped, whichever comes first.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::PipelineError;

const SCRATCH_PREFIX: &str = "trackroom-job-";

#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a unique directory under `parent`, or under the system temp dir.
    pub fn create(parent: Option<&Path>) -> Result<Self, PipelineError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PipelineError::Fetch(format!(
                        "Failed to create scratch parent {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| PipelineError::Fetch(format!("Failed to create scratch directory: {}", e)))?;

        tracing::debug!(path = %dir.path().display(), "Scratch directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a file inside the scratch directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory now. Removal errors are logged, not returned.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove scratch directory"
            );
        } else {
            tracing::debug!(path = %path.display(), "Scratch directory removed");
        }
    }
}
