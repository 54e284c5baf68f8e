use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::extract::ExtractError;
use crate::llm_client::LlmError;
use crate::models::ProfileError;
use crate::render::{CompileError, TemplateError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Inference error: {0}")]
    Inference(#[from] LlmError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Compilation error: {0}")]
    Compilation(#[from] CompileError),

    #[error("Job did not finish within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Inference(e) => {
                tracing::error!("Inference error: {e}");
                let code = match e {
                    LlmError::Unavailable(_) => "INFERENCE_UNAVAILABLE",
                    LlmError::Malformed(_) => "INFERENCE_MALFORMED",
                };
                (
                    StatusCode::BAD_GATEWAY,
                    code,
                    "The AI service could not be reached or returned an unusable response".to_string(),
                )
            }
            AppError::Extraction(e) => {
                tracing::error!("Extraction error: {e}");
                let code = match e {
                    ExtractError::Parse { .. } => "EXTRACTION_ERROR",
                    ExtractError::Schema(_) => "SCHEMA_ERROR",
                };
                (
                    StatusCode::BAD_GATEWAY,
                    code,
                    "The AI response did not contain the expected JSON".to_string(),
                )
            }
            AppError::Profile(e) => {
                tracing::error!("Profile error: {e}");
                // The read error names a server path; only the log gets it.
                let message = match e {
                    ProfileError::Io { .. } => "profile could not be read".to_string(),
                    other => other.to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "PROFILE_ERROR", message)
            }
            AppError::Template(e) => {
                tracing::error!("Template error: {e}");
                let code = match e {
                    TemplateError::Syntax { .. } => "TEMPLATE_SYNTAX_ERROR",
                    TemplateError::Render { .. } => "TEMPLATE_RENDER_ERROR",
                };
                (StatusCode::INTERNAL_SERVER_ERROR, code, e.to_string())
            }
            AppError::Compilation(e) => {
                tracing::error!("Compilation error: {e}");
                let status = match e {
                    CompileError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "COMPILATION_FAILED", e.to_string())
            }
            AppError::Timeout(limit) => {
                tracing::warn!("Job timed out after {}s", limit.as_secs());
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "JOB_TIMEOUT",
                    "The request took too long; the server may be busy with another job".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
