//! Authoritative in-memory record of job state.
//!
//! Each job lives in its own `watch` channel so request handlers can await
//! a terminal state without polling. The outer `RwLock` only guards the
//! map itself; transitions take a read lock and mutate through the job's
//! channel, so work on one job never blocks another.

use std::collections::HashMap;

use bookvision_core::error::CoreError;
use bookvision_core::job::{Job, JobStatus, JobTransition};
use bookvision_core::types::{JobId, Timestamp};
use tokio::sync::{watch, RwLock};

/// Job counts by non-terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    /// Waiting for an admission permit.
    pub queued: usize,
    /// Transform process running.
    pub active: usize,
}

#[derive(Debug, Default)]
pub struct JobTracker {
    jobs: RwLock<HashMap<JobId, watch::Sender<Job>>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted job. Ids are never reused.
    pub async fn insert(&self, job: Job) -> Result<(), CoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(CoreError::Conflict(format!("Job {} already exists", job.id)));
        }
        jobs.insert(job.id, watch::channel(job).0);
        Ok(())
    }

    /// Snapshot of a job's current state.
    pub async fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.read().await.get(&id).map(|tx| tx.borrow().clone())
    }

    /// Apply a lifecycle transition and return the updated job.
    ///
    /// Illegal transitions leave the job untouched and return
    /// [`CoreError::Conflict`].
    pub async fn transition(&self, id: JobId, transition: JobTransition) -> Result<Job, CoreError> {
        let jobs = self.jobs.read().await;
        let tx = jobs.get(&id).ok_or_else(|| not_found(id))?;

        let mut result = Ok(());
        tx.send_if_modified(|job| match job.apply(transition) {
            Ok(()) => true,
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result?;

        let job = tx.borrow().clone();
        tracing::debug!(job_id = %id, status = %job.status, "Job transitioned");
        Ok(job)
    }

    /// Watch a job's state changes.
    pub async fn subscribe(&self, id: JobId) -> Option<watch::Receiver<Job>> {
        self.jobs.read().await.get(&id).map(watch::Sender::subscribe)
    }

    /// Wait until the job is `completed` or `failed`.
    pub async fn wait_terminal(&self, id: JobId) -> Result<Job, CoreError> {
        let mut rx = self.subscribe(id).await.ok_or_else(|| not_found(id))?;
        let job = rx
            .wait_for(|job| job.status.is_terminal())
            .await
            .map_err(|_| not_found(id))?;
        Ok(job.clone())
    }

    pub async fn counts(&self) -> JobCounts {
        let jobs = self.jobs.read().await;
        jobs.values()
            .fold(JobCounts::default(), |mut counts, tx| {
                match tx.borrow().status {
                    JobStatus::Pending => counts.queued += 1,
                    JobStatus::Processing => counts.active += 1,
                    JobStatus::Completed | JobStatus::Failed => {}
                }
                counts
            })
    }

    /// Drop terminal jobs last updated before `cutoff`. Returns how many
    /// were removed.
    pub async fn evict_terminal_before(&self, cutoff: Timestamp) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, tx| {
            let job = tx.borrow();
            !(job.status.is_terminal() && job.updated_at < cutoff)
        });
        before - jobs.len()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

fn not_found(id: JobId) -> CoreError {
    CoreError::NotFound {
        entity: "Job",
        id: id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
