//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use learning_core::LearningError;
use serde_json::json;

use crate::correlation::CorrelationId;

/// A [`LearningError`] bound to the request it failed.
#[derive(Debug)]
pub struct AppError {
    pub error: LearningError,
    pub correlation_id: CorrelationId,
}

impl AppError {
    pub fn new(error: LearningError, correlation_id: &CorrelationId) -> Self {
        Self {
            error,
            correlation_id: correlation_id.clone(),
        }
    }
}

/// Attach a correlation id to a core result.
pub trait WithCorrelation<T> {
    fn with_correlation(self, correlation_id: &CorrelationId) -> Result<T, AppError>;
}

impl<T> WithCorrelation<T> for Result<T, LearningError> {
    fn with_correlation(self, correlation_id: &CorrelationId) -> Result<T, AppError> {
        self.map_err(|e| AppError::new(e, correlation_id))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let correlation_id = self.correlation_id.as_str();

        let body = match &self.error {
            LearningError::Validation(details) => {
                tracing::info!(%correlation_id, problems = details.len(), "request rejected");
                json!({
                    "error": self.error.code(),
                    "message": "request validation failed",
                    "correlationId": correlation_id,
                    "details": details,
                })
            }
            LearningError::Internal(e) => {
                // Detail stays in the log; callers only get the correlation id.
                tracing::error!(%correlation_id, "internal error: {e:#}");
                json!({
                    "error": self.error.code(),
                    "message": "internal server error",
                    "correlationId": correlation_id,
                })
            }
            other => {
                tracing::warn!(%correlation_id, "{other}");
                json!({
                    "error": self.error.code(),
                    "message": other.to_string(),
                    "correlationId": correlation_id,
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Error body for statuses with no [`LearningError`] counterpart.
pub fn error_response(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
    correlation_id: &CorrelationId,
) -> Response {
    let body = json!({
        "error": code,
        "message": message.into(),
        "correlationId": correlation_id.as_str(),
    });
    (status, Json(body)).into_response()
}
