use auditflow_core::error::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for orchestrator errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce the
/// `{"ok": false, "error", "code"}` envelope.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "ok": false,
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Map a [`CoreError`] to an HTTP status, error code, and message.
fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        CoreError::UnknownScript(_) => (StatusCode::NOT_FOUND, "UNKNOWN_SCRIPT", message),
        CoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
        CoreError::ConfigWrite(_) => (StatusCode::CONFLICT, "CONFIG_WRITE", message),
        CoreError::AtCapacity { .. } => (StatusCode::SERVICE_UNAVAILABLE, "AT_CAPACITY", message),
        CoreError::InterpreterNotFound { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "INTERPRETER_NOT_FOUND",
            message,
        ),
        CoreError::ProcessSpawn(_) => {
            tracing::error!(error = %message, "Worker spawn failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "PROCESS_SPAWN", message)
        }
        CoreError::NonZeroExit { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "NON_ZERO_EXIT", message)
        }
        CoreError::IndexWrite(_) => {
            tracing::error!(error = %message, "Results index write failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "INDEX_WRITE", message)
        }
        CoreError::Export(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_FAILED", message),
        CoreError::InvalidRegistry(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_REGISTRY", message)
        }
    }
}
