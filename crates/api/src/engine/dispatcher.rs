//! Background job dispatcher.
//!
//! Every accepted job runs on its own Tokio task tracked by a
//! [`TaskTracker`], so a client that disconnects never aborts the job. A
//! [`Semaphore`] bounds how many transform processes run at once; queued
//! jobs stay `pending` until a permit frees up.
//!
//! Per job:
//!
//! 1. wait for an admission permit (or shutdown)
//! 2. `pending -> processing`
//! 3. create the output directory and run the transform tool
//! 4. on exit 0, parse the stdout summary and verify both artifacts
//! 5. record `completed` or `failed` and mirror it to the document store

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bookvision_core::artifacts::{ArtifactHints, ArtifactResolver, ResolveError};
use bookvision_core::document::{Document, DocumentStore};
use bookvision_core::job::{Job, JobFailure, JobOutcome, JobTransition};
use bookvision_core::layout::StorageLayout;
use bookvision_core::transform::executor::{
    TransformError, TransformExecutor, TransformOutput, TransformRequest,
};
use bookvision_core::transform::summary::{parse_summary, SummaryParse};
use bookvision_core::types::JobId;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::tracker::JobTracker;

pub struct JobDispatcher {
    tracker: Arc<JobTracker>,
    executor: Arc<dyn TransformExecutor>,
    resolver: ArtifactResolver,
    layout: StorageLayout,
    documents: Arc<dyn DocumentStore>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl JobDispatcher {
    pub fn new(
        tracker: Arc<JobTracker>,
        executor: Arc<dyn TransformExecutor>,
        resolver: ArtifactResolver,
        layout: StorageLayout,
        documents: Arc<dyn DocumentStore>,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            tracker,
            executor,
            resolver,
            layout,
            documents,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs)),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Start running a job that is already registered with the tracker.
    pub fn submit(self: &Arc<Self>, id: JobId) {
        let this = Arc::clone(self);
        self.tasks.spawn(async move { this.run(id).await });
        tracing::debug!(job_id = %id, "Job submitted");
    }

    /// Kill running processes and fail every queued or running job with
    /// `CANCELLED`. Requests waiting on those jobs are released.
    pub fn cancel_all(&self) {
        tracing::info!(in_flight = self.tasks.len(), "Cancelling in-flight jobs");
        self.cancel.cancel();
    }

    /// Wait up to `grace` for job tasks to record their final state.
    /// Returns `false` if some were still running when the grace ran out.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tasks.close();
        let drained = tokio::time::timeout(grace, self.tasks.wait()).await.is_ok();
        if !drained {
            tracing::warn!(
                remaining = self.tasks.len(),
                "Job tasks still running after shutdown grace period",
            );
        }
        drained
    }

    async fn run(&self, id: JobId) {
        let outcome = self.drive(id).await;
        self.finish(id, outcome).await;
    }

    async fn drive(&self, id: JobId) -> JobOutcome {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return failed(JobFailure::cancelled("Server shut down before the job started"));
            }
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(e) => return failed(JobFailure::internal(e)),
            },
        };

        let job = match self.tracker.transition(id, JobTransition::Start).await {
            Ok(job) => job,
            Err(e) => return failed(JobFailure::internal(e)),
        };
        self.sync_document(&job).await;

        let output_dir = match self.layout.create_output_dir(id).await {
            Ok(dir) => dir,
            Err(e) => {
                return failed(JobFailure::internal(format!(
                    "failed to create output directory: {e}"
                )))
            }
        };

        let request = TransformRequest {
            job_id: id,
            input: job.source_path.clone(),
            output_dir: output_dir.clone(),
        };

        match self.executor.execute(request, self.cancel.child_token()).await {
            Ok(output) if output.succeeded() => self.resolve(id, &output_dir, &output).await,
            Ok(output) => failed(JobFailure::exited(output.exit_code, output.diagnostics())),
            Err(TransformError::Spawn { program, source }) => {
                failed(JobFailure::spawn_failed(format!("{program}: {source}")))
            }
            Err(TransformError::Timeout { elapsed_ms, stderr }) => {
                failed(JobFailure::timed_out(elapsed_ms, stderr))
            }
            Err(TransformError::Cancelled { stderr, .. }) => failed(JobFailure::cancelled(stderr)),
            Err(TransformError::Io(e)) => failed(JobFailure::internal(e)),
        }
    }

    /// Turn a clean exit into an outcome by verifying the artifacts.
    async fn resolve(&self, id: JobId, output_dir: &Path, output: &TransformOutput) -> JobOutcome {
        let (hints, reported_error, malformed) = match parse_summary(&output.stdout) {
            SummaryParse::Parsed(summary) => {
                if summary.success == Some(false) {
                    tracing::warn!(job_id = %id, "Transform summary reports failure despite exit code 0");
                }
                (ArtifactHints::from(&summary), summary.error, None)
            }
            SummaryParse::Absent => (ArtifactHints::default(), None, None),
            SummaryParse::Malformed(reason) => {
                tracing::warn!(job_id = %id, reason = %reason, "Unparseable transform summary, using default artifact names");
                (ArtifactHints::default(), None, Some(reason))
            }
        };

        match self.resolver.resolve(id, output_dir, &hints).await {
            Ok(artifacts) => JobOutcome::Completed { artifacts },
            Err(ResolveError::Missing { missing }) => {
                let mut lines = vec![format!("missing artifacts: {}", missing.join(", "))];
                if let Some(error) = reported_error {
                    lines.push(format!("tool reported: {error}"));
                }
                if let Some(reason) = &malformed {
                    lines.push(format!("summary: {reason}"));
                }
                let stderr = output.stderr.trim();
                if !stderr.is_empty() {
                    lines.push(stderr.to_string());
                }
                let diagnostics = lines.join("\n");

                failed(match malformed {
                    Some(_) => JobFailure::malformed_output(&missing, diagnostics),
                    None => JobFailure::missing_artifacts(&missing, diagnostics),
                })
            }
            Err(ResolveError::Io(e)) => {
                failed(JobFailure::internal(format!("failed to check artifacts: {e}")))
            }
        }
    }

    async fn finish(&self, id: JobId, outcome: JobOutcome) {
        match &outcome {
            JobOutcome::Completed { artifacts } => tracing::info!(
                job_id = %id,
                original = %artifacts.original.url,
                digital = %artifacts.digital.url,
                "Job completed",
            ),
            JobOutcome::Failed { failure } => tracing::warn!(
                job_id = %id,
                code = failure.code(),
                error = %failure.message,
                diagnostics = %failure.diagnostics,
                "Job failed",
            ),
        }

        match self.tracker.transition(id, outcome.into()).await {
            Ok(job) => self.sync_document(&job).await,
            Err(e) => tracing::error!(job_id = %id, error = %e, "Failed to record job outcome"),
        }
    }

    async fn sync_document(&self, job: &Job) {
        if let Err(e) = self.documents.upsert(Document::from(job)).await {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to update document record");
        }
    }
}

fn failed(failure: JobFailure) -> JobOutcome {
    JobOutcome::Failed { failure }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
