use axum::routing::get;
use axum::Router;

use crate::handlers::documents;
use crate::state::AppState;

/// Routes mounted at `/documents`.
///
/// ```text
/// GET    /?userId=        -> list_documents
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(documents::list_documents))
}
