//! Transform execution interface and shared types.
//!
//! Defines [`TransformExecutor`], the seam between the job dispatcher and
//! whatever actually runs the transform tool, along with
//! [`TransformRequest`], [`TransformOutput`], and [`TransformError`].

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::types::JobId;

/// What the transform tool is asked to do for one job.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub job_id: JobId,
    /// Stored upload.
    pub input: PathBuf,
    /// Directory the tool must write both PDFs into.
    pub output_dir: PathBuf,
}

/// Captured result of a process that ran to exit.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Complete stdout captured from the process.
    pub stdout: String,
    /// Complete stderr captured from the process.
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl TransformOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Text worth keeping for operators: stderr, else stdout, else a note
    /// that the process said nothing.
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!(
            "process exited with code {} and produced no output",
            self.exit_code
        )
    }
}

/// Errors that prevent the process from running to a normal exit.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Transform timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64, stderr: String },

    #[error("Transform cancelled after {elapsed_ms}ms")]
    Cancelled { elapsed_ms: u64, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Runs the transform for one job.
///
/// The cancellation token is triggered on server shutdown; implementations
/// must stop the underlying work and return [`TransformError::Cancelled`].
#[async_trait]
pub trait TransformExecutor: Send + Sync {
    async fn execute(
        &self,
        request: TransformRequest,
        cancel: CancellationToken,
    ) -> Result<TransformOutput, TransformError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
