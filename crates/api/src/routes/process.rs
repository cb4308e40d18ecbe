use axum::routing::post;
use axum::Router;

use crate::handlers::process;
use crate::state::AppState;

/// Routes mounted at `/process`.
///
/// ```text
/// POST   /                -> process_upload
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(process::process_upload))
}
