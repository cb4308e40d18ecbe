use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bookvision_core::error::CoreError;
use bookvision_core::intake::IntakeError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`IntakeError`] for upload
/// rejections, and adds HTTP-specific variants. Implements [`IntoResponse`]
/// to produce consistent `{ "error", "code" }` JSON bodies.
///
/// Job failures are not errors at this layer: they are translated into a
/// response by [`crate::response::translate_outcome`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `bookvision_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The upload was rejected before any job work started.
    #[error(transparent)]
    Intake(#[from] IntakeError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const SANITIZED: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        SANITIZED.to_string(),
                    )
                }
            },

            // --- Intake rejections ---
            AppError::Intake(err) => match err {
                IntakeError::NoFile
                | IntakeError::UnsupportedMedia { .. }
                | IntakeError::Malformed(_) => {
                    (StatusCode::BAD_REQUEST, err.code(), err.to_string())
                }
                IntakeError::TooLarge { .. } => {
                    (StatusCode::PAYLOAD_TOO_LARGE, err.code(), err.to_string())
                }
                IntakeError::Io(e) => {
                    tracing::error!(error = %e, "Upload storage error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        err.code(),
                        SANITIZED.to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    SANITIZED.to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
