use axum::extract::{Path, State};
use axum::Json;
use bookvision_core::error::CoreError;
use bookvision_core::types::JobId;

use crate::error::AppResult;
use crate::response::JobView;
use crate::state::AppState;

/// GET /api/jobs/{id}
///
/// Current state of a job. Jobs evicted by the retention sweeper are
/// reported as not found.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<JobView>> {
    let id: JobId = id.parse()?;
    let job = state.tracker.get(id).await.ok_or(CoreError::NotFound {
        entity: "Job",
        id: id.to_string(),
    })?;
    Ok(Json(JobView::from(&job)))
}
