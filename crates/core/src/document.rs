//! User-facing document record mirrored from job state.
//!
//! The document store belongs to an external collaborator; the orchestrator
//! only pushes the current status and artifact URLs on every transition.
//! [`InMemoryDocumentStore`] is the default implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::job::{Job, JobStatus};
use crate::types::{JobId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub job_id: JobId,
    pub user_id: Option<String>,
    pub title: String,
    /// Stored upload file name, relative to the upload root. Uploads are
    /// not served, so this is a reference rather than a fetchable URL.
    pub video_url: Option<String>,
    pub original_pdf_url: Option<String>,
    pub ocr_pdf_url: Option<String>,
    pub status: JobStatus,
    pub updated_at: Timestamp,
}

impl From<&Job> for Document {
    fn from(job: &Job) -> Self {
        let artifacts = job.artifacts.as_ref();
        Self {
            job_id: job.id,
            user_id: job.user_id.clone(),
            title: job.title.clone(),
            video_url: job
                .source_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            original_pdf_url: artifacts.map(|a| a.original.url.clone()),
            ocr_pdf_url: artifacts.map(|a| a.digital.url.clone()),
            status: job.status,
            updated_at: job.updated_at,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace the record for `document.job_id`.
    async fn upsert(&self, document: Document) -> Result<(), CoreError>;

    /// All documents owned by `user_id`, most recently updated first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Document>, CoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<JobId, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, job_id: JobId) -> Option<Document> {
        self.documents.read().await.get(&job_id).cloned()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert(&self, document: Document) -> Result<(), CoreError> {
        let mut documents = self.documents.write().await;
        // A late write must not roll a terminal record back.
        if let Some(existing) = documents.get(&document.job_id) {
            if existing.status.is_terminal() && !document.status.is_terminal() {
                return Ok(());
            }
        }
        documents.insert(document.job_id, document);
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Document>, CoreError> {
        let mut found: Vec<Document> = self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::job::{ArtifactLocation, Artifacts, JobTransition, NewJob};

    fn job_for(user: Option<&str>) -> Job {
        let id = JobId::new();
        Job::pending(NewJob {
            id,
            source_path: PathBuf::from(format!("/uploads/{id}.mp4")),
            output_dir: PathBuf::from(format!("/output/{id}")),
            media_type: "video/mp4".into(),
            title: "Field Notes".into(),
            user_id: user.map(str::to_string),
        })
    }

    #[test]
    fn document_carries_artifact_urls_once_completed() {
        let mut job = job_for(Some("u1"));
        assert!(Document::from(&job).original_pdf_url.is_none());

        job.apply(JobTransition::Start).expect("start");
        job.apply(JobTransition::Complete(Artifacts {
            original: ArtifactLocation {
                path: PathBuf::from("/o/original.pdf"),
                url: "/static/x/original.pdf".into(),
            },
            digital: ArtifactLocation {
                path: PathBuf::from("/o/digital.pdf"),
                url: "/static/x/digital.pdf".into(),
            },
        }))
        .expect("complete");

        let doc = Document::from(&job);
        assert_eq!(doc.status, JobStatus::Completed);
        assert_eq!(doc.original_pdf_url.as_deref(), Some("/static/x/original.pdf"));
        assert_eq!(doc.ocr_pdf_url.as_deref(), Some("/static/x/digital.pdf"));
    }

    #[test]
    fn video_reference_does_not_expose_server_paths() {
        let job = job_for(None);
        let doc = Document::from(&job);
        assert_eq!(doc.video_url, Some(format!("{}.mp4", job.id)));
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(Document::from(&job_for(Some("u1")))).expect("json");
        assert!(json.get("jobId").is_some());
        assert!(json.get("ocrPdfUrl").is_some());
        assert_eq!(json["status"], "pending");
    }

    #[tokio::test]
    async fn lists_only_the_users_documents() {
        let store = InMemoryDocumentStore::new();
        store.upsert(Document::from(&job_for(Some("alice")))).await.expect("upsert");
        store.upsert(Document::from(&job_for(Some("alice")))).await.expect("upsert");
        store.upsert(Document::from(&job_for(Some("bob")))).await.expect("upsert");
        store.upsert(Document::from(&job_for(None))).await.expect("upsert");

        assert_eq!(store.list_by_user("alice").await.expect("list").len(), 2);
        assert_eq!(store.list_by_user("bob").await.expect("list").len(), 1);
        assert!(store.list_by_user("carol").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn terminal_record_is_not_rolled_back() {
        let store = InMemoryDocumentStore::new();
        let mut job = job_for(Some("alice"));
        let pending = Document::from(&job);
        job.apply(JobTransition::Start).expect("start");
        job.apply(JobTransition::Fail(crate::job::JobFailure::exited(1, "boom")))
            .expect("fail");

        store.upsert(Document::from(&job)).await.expect("upsert");
        store.upsert(pending).await.expect("upsert");

        let stored = store.get(job.id).await.expect("present");
        assert_eq!(stored.status, JobStatus::Failed);
    }
}
