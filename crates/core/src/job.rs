//! Job model and lifecycle state machine.
//!
//! A [`Job`] tracks one uploaded file from intake to a terminal state.
//! Status only moves forward:
//!
//! ```text
//! pending ──start──▶ processing ──complete──▶ completed
//!    │                   │
//!    └──────fail─────────┴──────fail────────▶ failed
//! ```
//!
//! `completed` and `failed` are terminal. All mutation goes through
//! [`Job::apply`], which rejects any transition not drawn above.

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a job. Shared with the document record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `completed` and `failed` never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    ///
    /// `pending -> failed` covers jobs that never reach the process
    /// (cancelled while queued, output directory could not be created).
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

/// Machine-readable category of a job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The transform tool could not be started.
    ProcessSpawnFailed,
    /// The transform tool exited with a non-zero code.
    ProcessExitFailed,
    /// The transform tool exceeded its wall-clock limit and was killed.
    Timeout,
    /// The server shut down while the job was queued or running.
    Cancelled,
    /// The tool exited cleanly but one or both PDFs are absent.
    MissingArtifact,
    /// Artifacts are absent and the tool's stdout summary was unparseable.
    MalformedProcessOutput,
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

impl FailureKind {
    /// Stable code surfaced to clients.
    pub fn code(self) -> &'static str {
        match self {
            Self::ProcessSpawnFailed => "PROCESS_SPAWN_FAILED",
            Self::ProcessExitFailed => "PROCESS_EXIT_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::MissingArtifact => "MISSING_ARTIFACT",
            Self::MalformedProcessOutput => "MALFORMED_PROCESS_OUTPUT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Why a job failed, with the diagnostics retained for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    /// Short human-readable reason.
    pub message: String,
    /// Captured process output or error detail. Never empty.
    pub diagnostics: String,
}

impl JobFailure {
    fn new(kind: FailureKind, message: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        let message = message.into();
        let mut diagnostics = diagnostics.into();
        if diagnostics.trim().is_empty() {
            diagnostics = message.clone();
        }
        Self {
            kind,
            message,
            diagnostics,
        }
    }

    pub fn spawn_failed(detail: impl fmt::Display) -> Self {
        Self::new(
            FailureKind::ProcessSpawnFailed,
            "Failed to start transformation process",
            detail.to_string(),
        )
    }

    pub fn exited(exit_code: i32, diagnostics: impl Into<String>) -> Self {
        Self::new(
            FailureKind::ProcessExitFailed,
            format!("Transformation process exited with code {exit_code}"),
            diagnostics,
        )
    }

    pub fn timed_out(elapsed_ms: u64, diagnostics: impl Into<String>) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("Transformation process timed out after {elapsed_ms}ms"),
            diagnostics,
        )
    }

    pub fn cancelled(diagnostics: impl Into<String>) -> Self {
        Self::new(FailureKind::Cancelled, "Job cancelled", diagnostics)
    }

    pub fn missing_artifacts(missing: &[String], diagnostics: impl Into<String>) -> Self {
        Self::new(
            FailureKind::MissingArtifact,
            format!("Missing output artifact: {}", missing.join(", ")),
            diagnostics,
        )
    }

    pub fn malformed_output(missing: &[String], diagnostics: impl Into<String>) -> Self {
        Self::new(
            FailureKind::MalformedProcessOutput,
            format!(
                "Malformed transformation output and missing artifact: {}",
                missing.join(", ")
            ),
            diagnostics,
        )
    }

    pub fn internal(detail: impl fmt::Display) -> Self {
        Self::new(FailureKind::Internal, "Internal error", detail.to_string())
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// A verified artifact on disk and the URL it is served under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub path: PathBuf,
    pub url: String,
}

/// The pair of PDFs a successful job produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    /// Image-only PDF reproducing the captured pages.
    pub original: ArtifactLocation,
    /// Text-searchable PDF with an OCR layer.
    pub digital: ArtifactLocation,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Fields known at intake time.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: JobId,
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    pub media_type: String,
    pub title: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Stored upload. Owned by this job until cleanup.
    pub source_path: PathBuf,
    /// `<output_root>/<id>`; the transform tool writes here.
    pub output_dir: PathBuf,
    pub media_type: String,
    pub title: String,
    pub user_id: Option<String>,
    pub status: JobStatus,
    /// Set only once both files have been verified on disk.
    pub artifacts: Option<Artifacts>,
    /// Set only when `status` is `failed`.
    pub failure: Option<JobFailure>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A requested lifecycle change.
#[derive(Debug, Clone)]
pub enum JobTransition {
    Start,
    Complete(Artifacts),
    Fail(JobFailure),
}

impl JobTransition {
    pub fn target(&self) -> JobStatus {
        match self {
            Self::Start => JobStatus::Processing,
            Self::Complete(_) => JobStatus::Completed,
            Self::Fail(_) => JobStatus::Failed,
        }
    }
}

/// Resolved result of running a job to the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { artifacts: Artifacts },
    Failed { failure: JobFailure },
}

impl From<JobOutcome> for JobTransition {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Completed { artifacts } => Self::Complete(artifacts),
            JobOutcome::Failed { failure } => Self::Fail(failure),
        }
    }
}

impl Job {
    /// Create a job in the `pending` state.
    pub fn pending(new: NewJob) -> Self {
        let now = Utc::now();
        Self {
            id: new.id,
            source_path: new.source_path,
            output_dir: new.output_dir,
            media_type: new.media_type,
            title: new.title,
            user_id: new.user_id,
            status: JobStatus::Pending,
            artifacts: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a transition, rejecting anything that would move backward or
    /// leave a terminal state.
    pub fn apply(&mut self, transition: JobTransition) -> Result<(), CoreError> {
        let next = transition.target();
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "Job {} cannot move from {} to {next}",
                self.id, self.status
            )));
        }

        match transition {
            JobTransition::Start => {}
            JobTransition::Complete(artifacts) => self.artifacts = Some(artifacts),
            JobTransition::Fail(failure) => self.failure = Some(failure),
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Retained diagnostics, present only on failure.
    pub fn diagnostics(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.diagnostics.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sample_job() -> Job {
        let id = JobId::new();
        Job::pending(NewJob {
            id,
            source_path: PathBuf::from(format!("/uploads/{id}.mp4")),
            output_dir: PathBuf::from(format!("/output/{id}")),
            media_type: "video/mp4".into(),
            title: "book".into(),
            user_id: None,
        })
    }

    fn sample_artifacts() -> Artifacts {
        Artifacts {
            original: ArtifactLocation {
                path: PathBuf::from("/output/x/original.pdf"),
                url: "/static/x/original.pdf".into(),
            },
            digital: ArtifactLocation {
                path: PathBuf::from("/output/x/digital.pdf"),
                url: "/static/x/digital.pdf".into(),
            },
        }
    }

    #[test]
    fn happy_path_reaches_completed() {
        let mut job = sample_job();
        assert_eq!(job.status, JobStatus::Pending);
        job.apply(JobTransition::Start).expect("start");
        job.apply(JobTransition::Complete(sample_artifacts()))
            .expect("complete");
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.artifacts.is_some());
        assert!(job.diagnostics().is_none());
    }

    #[test]
    fn failure_keeps_diagnostics_and_no_artifacts() {
        let mut job = sample_job();
        job.apply(JobTransition::Start).expect("start");
        job.apply(JobTransition::Fail(JobFailure::exited(2, "boom")))
            .expect("fail");
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.artifacts.is_none());
        assert_eq!(job.diagnostics(), Some("boom"));
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let mut job = sample_job();
        job.apply(JobTransition::Start).expect("start");
        job.apply(JobTransition::Fail(JobFailure::cancelled("x")))
            .expect("fail");

        assert_matches!(job.apply(JobTransition::Start), Err(CoreError::Conflict(_)));
        assert_matches!(
            job.apply(JobTransition::Complete(sample_artifacts())),
            Err(CoreError::Conflict(_))
        );
        assert_matches!(
            job.apply(JobTransition::Fail(JobFailure::cancelled("y"))),
            Err(CoreError::Conflict(_))
        );
        assert_eq!(job.diagnostics(), Some("x"));
    }

    #[test]
    fn pending_cannot_complete_directly() {
        let mut job = sample_job();
        assert_matches!(
            job.apply(JobTransition::Complete(sample_artifacts())),
            Err(CoreError::Conflict(_))
        );
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn pending_may_fail_before_start() {
        let mut job = sample_job();
        job.apply(JobTransition::Fail(JobFailure::cancelled("shutdown")))
            .expect("fail");
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn processing_cannot_restart() {
        let mut job = sample_job();
        job.apply(JobTransition::Start).expect("start");
        assert_matches!(job.apply(JobTransition::Start), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn empty_diagnostics_fall_back_to_message() {
        let failure = JobFailure::exited(3, "   ");
        assert_eq!(failure.diagnostics, failure.message);
        assert!(!failure.diagnostics.is_empty());
    }

    #[test]
    fn failure_codes_are_stable() {
        assert_eq!(JobFailure::spawn_failed("x").code(), "PROCESS_SPAWN_FAILED");
        assert_eq!(JobFailure::exited(1, "x").code(), "PROCESS_EXIT_FAILED");
        assert_eq!(JobFailure::timed_out(5, "x").code(), "TIMEOUT");
        assert_eq!(JobFailure::cancelled("x").code(), "CANCELLED");
        assert_eq!(
            JobFailure::missing_artifacts(&["digital.pdf".into()], "x").code(),
            "MISSING_ARTIFACT"
        );
        assert_eq!(
            JobFailure::malformed_output(&["digital.pdf".into()], "x").code(),
            "MALFORMED_PROCESS_OUTPUT"
        );
        assert_eq!(JobFailure::internal("x").code(), "INTERNAL_ERROR");
    }

    #[test]
    fn failure_kind_serializes_as_code() {
        let json = serde_json::to_value(FailureKind::Internal).expect("serialize");
        assert_eq!(json, "INTERNAL_ERROR");
        let json = serde_json::to_value(FailureKind::MissingArtifact).expect("serialize");
        assert_eq!(json, "MISSING_ARTIFACT");
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_value(JobStatus::Processing).expect("serialize");
        assert_eq!(json, "processing");
    }
}
