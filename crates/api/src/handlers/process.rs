//! Handler for `POST /api/process`: upload intake and job submission.

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bookvision_core::document::Document;
use bookvision_core::intake::{claim_upload_slot, IntakeError, StoredUpload};
use bookvision_core::job::{Job, NewJob};
use bookvision_core::media::{title_from_file_name, AcceptedMedia};
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::{translate_outcome, JobAccepted};
use crate::state::AppState;

/// Title used when neither the form nor the filename provides one.
const DEFAULT_TITLE: &str = "Untitled";

/// Largest accepted `title` or `userId` value.
const MAX_TEXT_FIELD_BYTES: usize = 1024;

#[derive(Debug, Deserialize)]
pub struct ProcessParams {
    /// Hold the request open until the job is terminal (default `true`).
    #[serde(default = "default_wait")]
    pub wait: bool,
}

fn default_wait() -> bool {
    true
}

/// Fields collected from the multipart form.
#[derive(Default)]
struct UploadForm {
    file: Option<ReceivedFile>,
    title: Option<String>,
    user_id: Option<String>,
}

struct ReceivedFile {
    stored: StoredUpload,
    media: AcceptedMedia,
    file_name: Option<String>,
}

/// POST /api/process
///
/// Accepts a multipart form with a required `file` field and optional
/// `title` and `userId` fields. The upload is streamed to disk under a
/// fresh job id and handed to the dispatcher. With `wait=true` (the
/// default) the response reports the job's terminal state; with
/// `wait=false` it returns `202` right away.
pub async fn process_upload(
    State(state): State<AppState>,
    Query(params): Query<ProcessParams>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Response> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Request is not a multipart upload");
        IntakeError::NoFile
    })?;

    let mut form = UploadForm::default();
    if let Err(e) = read_form(&state, &mut multipart, &mut form).await {
        if let Some(file) = form.file {
            remove_stored(&file.stored).await;
        }
        tracing::info!(code = e.code(), error = %e, "Upload rejected");
        return Err(e.into());
    }
    let file = form.file.ok_or(IntakeError::NoFile)?;

    let id = file.stored.id;
    let title = form
        .title
        .or_else(|| file.file_name.as_deref().and_then(title_from_file_name))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let job = Job::pending(NewJob {
        id,
        source_path: file.stored.path.clone(),
        output_dir: state.layout.output_dir(id),
        media_type: file.media.media_type.clone(),
        title,
        user_id: form.user_id,
    });

    tracing::info!(
        job_id = %id,
        media_type = %job.media_type,
        size_bytes = file.stored.size_bytes,
        title = %job.title,
        "Upload accepted",
    );

    if let Err(e) = state.tracker.insert(job.clone()).await {
        remove_stored(&file.stored).await;
        return Err(e.into());
    }
    if let Err(e) = state.documents.upsert(Document::from(&job)).await {
        tracing::warn!(job_id = %id, error = %e, "Failed to create document record");
    }
    state.dispatcher.submit(id);

    if !params.wait {
        return Ok((StatusCode::ACCEPTED, Json(JobAccepted::new(id))).into_response());
    }

    let done = state.tracker.wait_terminal(id).await?;
    Ok(translate_outcome(&done))
}

async fn read_form(
    state: &AppState,
    multipart: &mut Multipart,
    form: &mut UploadForm,
) -> Result<(), IntakeError> {
    let limit = state.config.upload.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                if form.file.is_some() {
                    return Err(IntakeError::Malformed(
                        "only one file may be uploaded per request".into(),
                    ));
                }
                form.file = Some(receive_file(state, field).await?);
            }
            "title" => form.title = text_field(field, "title", limit).await?,
            "userId" => form.user_id = text_field(field, "userId", limit).await?,
            _ => {} // ignore unknown fields
        }
    }
    Ok(())
}

/// Validate the media type, then stream the field into a freshly claimed
/// upload slot.
async fn receive_file(state: &AppState, mut field: Field<'_>) -> Result<ReceivedFile, IntakeError> {
    let limit = state.config.upload.max_upload_bytes;
    let file_name = field.file_name().map(str::to_string);

    // Browsers send an empty part with no filename when nothing was chosen.
    if file_name.as_deref() == Some("") {
        return Err(IntakeError::NoFile);
    }

    let media = state
        .media_policy
        .classify(field.content_type(), file_name.as_deref())?;

    let mut slot = claim_upload_slot(&state.layout, &media.extension, limit).await?;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                slot.discard().await;
                return Err(multipart_error(e, limit));
            }
        };
        if let Err(e) = slot.write_chunk(&chunk).await {
            slot.discard().await;
            return Err(e);
        }
    }
    let stored = slot.finish().await?;

    Ok(ReceivedFile {
        stored,
        media,
        file_name,
    })
}

/// Read a short text field chunk by chunk, rejecting anything over
/// [`MAX_TEXT_FIELD_BYTES`] before it is buffered.
async fn text_field(
    mut field: Field<'_>,
    name: &str,
    limit: u64,
) -> Result<Option<String>, IntakeError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
        if bytes.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(IntakeError::Malformed(format!(
                "field `{name}` exceeds {MAX_TEXT_FIELD_BYTES} bytes"
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    let text = String::from_utf8(bytes)
        .map_err(|_| IntakeError::Malformed(format!("field `{name}` is not valid UTF-8")))?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

fn multipart_error(err: MultipartError, limit: u64) -> IntakeError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IntakeError::TooLarge { limit }
    } else {
        IntakeError::Malformed(err.body_text())
    }
}

async fn remove_stored(stored: &StoredUpload) {
    if let Err(e) = tokio::fs::remove_file(&stored.path).await {
        tracing::warn!(job_id = %stored.id, path = %stored.path.display(), error = %e, "Failed to remove rejected upload");
    }
}
