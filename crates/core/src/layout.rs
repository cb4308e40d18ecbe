//! On-disk layout of uploads and job output directories.
//!
//! ```text
//! <upload_root>/<job_id>.<ext>      stored upload
//! <output_root>/<job_id>/           transform tool output
//!     original.pdf
//!     digital.pdf
//! ```
//!
//! Both paths are pure functions of the job id, so two jobs can never share
//! a file or directory.

use std::io;
use std::path::{Path, PathBuf};

use crate::types::JobId;

#[derive(Debug, Clone)]
pub struct StorageLayout {
    upload_root: PathBuf,
    output_root: PathBuf,
}

impl StorageLayout {
    pub fn new(upload_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_root: upload_root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Stored upload path. `extension` must already be sanitized.
    pub fn upload_path(&self, id: JobId, extension: &str) -> PathBuf {
        self.upload_root.join(format!("{id}.{extension}"))
    }

    pub fn output_dir(&self, id: JobId) -> PathBuf {
        self.output_root.join(id.to_string())
    }

    /// Create both roots if missing.
    pub async fn ensure_roots(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_root).await?;
        tokio::fs::create_dir_all(&self.output_root).await
    }

    /// Create the output directory for `id`. Succeeds if it already exists.
    pub async fn create_output_dir(&self, id: JobId) -> io::Result<PathBuf> {
        let dir = self.output_dir(id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
