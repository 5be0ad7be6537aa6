//! JSON error bodies for requests no route accepts.

use axum::{
    http::{Method, StatusCode, Uri},
    response::Response,
    Extension,
};
use learning_core::LearningError;

use crate::correlation::CorrelationId;
use crate::error::{error_response, AppError};

/// Router fallback: unknown path.
pub async fn not_found(Extension(cid): Extension<CorrelationId>, uri: Uri) -> AppError {
    AppError::new(
        LearningError::NotFound(format!("no route for {}", uri.path())),
        &cid,
    )
}

/// Method-router fallback: known path, unsupported method.
pub async fn method_not_allowed(
    Extension(cid): Extension<CorrelationId>,
    method: Method,
    uri: Uri,
) -> Response {
    tracing::info!(correlation_id = %cid, %method, path = uri.path(), "method not allowed");
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "method_not_allowed",
        format!("{method} is not supported on {}", uri.path()),
        &cid,
    )
}
