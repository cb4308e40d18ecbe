pub mod documents;
pub mod health;
pub mod jobs;
pub mod process;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /process                 upload and run a job (POST, ?wait=true|false)
/// /jobs/{id}               job status (GET)
/// /documents?userId=       a user's documents (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/process", process::router())
        .nest("/jobs", jobs::router())
        .nest("/documents", documents::router())
}
