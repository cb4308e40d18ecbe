//! The configured transform tool and its fixed argument contract.
//!
//! ```text
//! <program> [leading args...] --input <source> --output-dir <dir> [--tool-path-override <path>]
//! ```
//!
//! `leading_args` lets a deployment point at an interpreter plus script
//! (`python3 /opt/bookvision/ocr_pdf_pipeline.py`) without hard-coding
//! either path.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::executor::{TransformError, TransformExecutor, TransformOutput, TransformRequest};
use super::subprocess;

#[derive(Debug, Clone)]
pub struct TransformTool {
    /// Executable name or path.
    pub program: String,
    /// Arguments placed before the fixed contract arguments.
    pub leading_args: Vec<String>,
    /// Forwarded as `--tool-path-override` when set (e.g. the OCR engine binary).
    pub tool_path_override: Option<String>,
    /// Wall-clock limit per job.
    pub timeout: Duration,
}

impl TransformTool {
    /// Build the command for one request.
    pub fn command(&self, request: &TransformRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("--input")
            .arg(&request.input)
            .arg("--output-dir")
            .arg(&request.output_dir);
        if let Some(path) = &self.tool_path_override {
            cmd.arg("--tool-path-override").arg(path);
        }
        cmd
    }
}

#[async_trait]
impl TransformExecutor for TransformTool {
    async fn execute(
        &self,
        request: TransformRequest,
        cancel: CancellationToken,
    ) -> Result<TransformOutput, TransformError> {
        let mut cmd = self.command(&request);
        tracing::info!(
            job_id = %request.job_id,
            program = %self.program,
            input = %request.input.display(),
            output_dir = %request.output_dir.display(),
            "Starting transform process",
        );
        subprocess::run_command(&mut cmd, request.job_id, self.timeout, cancel).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
