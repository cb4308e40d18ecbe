//! Upload intake: claim a unique job id and stream the upload to disk.
//!
//! A job id is claimed by creating its upload file with create-new
//! semantics. An id whose upload file or output directory already exists
//! (for instance left behind by a previous server run) is never handed out
//! again; a fresh id is drawn instead.

use std::io;
use std::path::PathBuf;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::layout::StorageLayout;
use crate::types::JobId;

/// How many fresh ids to try before giving up on a claim.
const MAX_CLAIM_ATTEMPTS: usize = 8;

/// Errors raised while accepting an upload. None of them reach the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("No file uploaded")]
    NoFile,

    #[error("Unsupported media type")]
    UnsupportedMedia { media_type: String },

    #[error("Upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("Malformed upload: {0}")]
    Malformed(String),

    #[error("Storage error: {0}")]
    Io(#[from] io::Error),
}

impl IntakeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFile => "NO_FILE",
            Self::UnsupportedMedia { .. } => "UNSUPPORTED_MEDIA",
            Self::TooLarge { .. } => "UPLOAD_TOO_LARGE",
            Self::Malformed(_) => "MALFORMED_UPLOAD",
            Self::Io(_) => "INTERNAL_ERROR",
        }
    }
}

/// An upload fully written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub id: JobId,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// An open, exclusively-created upload file that chunks are streamed into.
///
/// Call [`finish`](Self::finish) on success or [`discard`](Self::discard)
/// on any error. A slot dropped without either (the request timed out or
/// the client went away mid-upload) removes its partial file.
#[derive(Debug)]
pub struct UploadSlot {
    id: JobId,
    path: PathBuf,
    file: File,
    written: u64,
    limit: u64,
    /// Cleared once the file is kept or already removed.
    armed: bool,
}

impl UploadSlot {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Append a chunk, enforcing the size limit.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), IntakeError> {
        let next = self.written + chunk.len() as u64;
        if next > self.limit {
            return Err(IntakeError::TooLarge { limit: self.limit });
        }
        self.file.write_all(chunk).await?;
        self.written = next;
        Ok(())
    }

    /// Flush and close. An empty upload counts as no file at all.
    pub async fn finish(mut self) -> Result<StoredUpload, IntakeError> {
        if self.written == 0 {
            self.discard().await;
            return Err(IntakeError::NoFile);
        }
        if let Err(e) = self.file.flush().await {
            self.discard().await;
            return Err(e.into());
        }
        self.armed = false;
        Ok(StoredUpload {
            id: self.id,
            path: self.path.clone(),
            size_bytes: self.written,
        })
    }

    /// Delete the partial file.
    pub async fn discard(mut self) {
        self.armed = false;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(job_id = %self.id, path = %self.path.display(), error = %e, "Failed to remove partial upload");
        }
    }
}

impl Drop for UploadSlot {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(job_id = %self.id, path = %self.path.display(), "Removed abandoned partial upload");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(job_id = %self.id, path = %self.path.display(), error = %e, "Failed to remove abandoned partial upload");
            }
        }
    }
}

/// Claim a fresh job id and open its upload file for writing.
///
/// `extension` must come from [`crate::media`] sanitization.
pub async fn claim_upload_slot(
    layout: &StorageLayout,
    extension: &str,
    limit: u64,
) -> Result<UploadSlot, IntakeError> {
    for _ in 0..MAX_CLAIM_ATTEMPTS {
        let id = JobId::new();

        if tokio::fs::try_exists(layout.output_dir(id)).await? {
            tracing::warn!(job_id = %id, "Output directory already exists, drawing a new job id");
            continue;
        }

        let path = layout.upload_path(id, extension);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => {
                return Ok(UploadSlot {
                    id,
                    path,
                    file,
                    written: 0,
                    limit,
                    armed: true,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::warn!(job_id = %id, "Upload file already exists, drawing a new job id");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(IntakeError::Io(io::Error::other(
        "could not claim a unique job id",
    )))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
