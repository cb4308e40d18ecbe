//! Client-facing response contract.
//!
//! Every payload uses one camelCase schema. Listing endpoints wrap their
//! payload in [`DataResponse`]; the process endpoint returns the flat
//! success/failure bodies below, which existing clients depend on.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bookvision_core::job::{Job, JobStatus};
use bookvision_core::types::{JobId, Timestamp};
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `200` body of a completed job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSuccess {
    pub success: bool,
    pub job_id: JobId,
    pub original_pdf_url: String,
    pub digital_pdf_url: String,
}

/// `202` body when the caller chose not to wait.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub success: bool,
    pub job_id: JobId,
    pub status: JobStatus,
}

impl JobAccepted {
    pub fn new(job_id: JobId) -> Self {
        Self {
            success: true,
            job_id,
            status: JobStatus::Pending,
        }
    }
}

/// `500` body of a failed job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFailure {
    pub error: String,
    pub code: &'static str,
    pub details: String,
    pub job_id: JobId,
}

/// Point-in-time view of a job for pollers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub title: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digital_pdf_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        let artifacts = job.artifacts.as_ref();
        let failure = job.failure.as_ref();
        Self {
            job_id: job.id,
            status: job.status,
            title: job.title.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            original_pdf_url: artifacts.map(|a| a.original.url.clone()),
            digital_pdf_url: artifacts.map(|a| a.digital.url.clone()),
            error: failure.map(|f| f.message.clone()),
            code: failure.map(|f| f.code()),
            details: failure.map(|f| f.diagnostics.clone()),
        }
    }
}

/// Map a terminal job to the process endpoint's response.
///
/// A job that is somehow not terminal, or completed without artifacts, is
/// reported as an internal error rather than a partial success.
pub fn translate_outcome(job: &Job) -> Response {
    match (job.status, &job.artifacts, &job.failure) {
        (JobStatus::Completed, Some(artifacts), _) => (
            StatusCode::OK,
            Json(ProcessSuccess {
                success: true,
                job_id: job.id,
                original_pdf_url: artifacts.original.url.clone(),
                digital_pdf_url: artifacts.digital.url.clone(),
            }),
        )
            .into_response(),
        (JobStatus::Failed, _, Some(failure)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ProcessFailure {
                error: failure.message.clone(),
                code: failure.code(),
                details: failure.diagnostics.clone(),
                job_id: job.id,
            }),
        )
            .into_response(),
        (status, _, _) => {
            tracing::error!(job_id = %job.id, %status, "Job reached response translation in an inconsistent state");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProcessFailure {
                    error: "Internal error".to_string(),
                    code: "INTERNAL_ERROR",
                    details: format!("job is {status}"),
                    job_id: job.id,
                }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
