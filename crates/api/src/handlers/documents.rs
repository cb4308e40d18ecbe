use axum::extract::{Query, State};
use axum::Json;
use bookvision_core::document::Document;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// GET /api/documents?userId=
///
/// A user's documents, most recently updated first.
pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<DocumentQuery>,
) -> AppResult<Json<DataResponse<Vec<Document>>>> {
    let user_id = query
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing required 'userId' parameter".into()))?;

    let documents = state.documents.list_by_user(&user_id).await?;
    Ok(Json(DataResponse { data: documents }))
}
