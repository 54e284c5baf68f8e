//! Axum route handlers for the tailoring API.

use std::future::Future;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::{ChatMessage, Role};
use crate::models::TailoringResult;
use crate::state::AppState;
use crate::tailoring::pipeline;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JobTextRequest {
    #[serde(alias = "jd_text")]
    pub job_text: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    /// Job page text the conversation is about.
    #[serde(default)]
    pub context: String,
    pub question: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

/// The extension posts the analysis back as-is; only these two fields matter.
#[derive(Debug, Deserialize)]
pub struct GeneratePdfRequest {
    #[serde(default)]
    pub tailored_summary: String,
    #[serde(default)]
    pub selected_projects: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// Runs `body` under the job gate. The deadline covers time spent queued.
async fn run_gated<F, T>(state: &AppState, job: &'static str, body: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    let job_id = Uuid::new_v4();
    let limit = state.config.job_timeout;
    let span = info_span!("job", %job_id, job);

    tokio::time::timeout(limit, state.gate.run(job, body))
        .instrument(span)
        .await
        .map_err(|_| AppError::Timeout(limit))?
}

/// POST /analyze
///
/// Scores the profile against a job description and proposes a tailored
/// summary plus the projects worth keeping.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<JobTextRequest>,
) -> Result<Json<TailoringResult>, AppError> {
    if request.job_text.trim().is_empty() {
        return Err(AppError::Validation("job_text cannot be empty".to_string()));
    }

    let result = run_gated(
        &state,
        "analyze",
        pipeline::analyze(&state.config, state.llm.as_ref(), &request.job_text),
    )
    .await?;

    Ok(Json(result))
}

/// POST /suggest-questions
///
/// Returns a bare JSON array of questions and never fails: a bad body, blank
/// input, queue timeouts and bad model output all fall back to a fixed list.
pub async fn handle_suggest_questions(
    State(state): State<AppState>,
    request: Result<Json<JobTextRequest>, JsonRejection>,
) -> Json<Vec<String>> {
    let job_text = match request {
        Ok(Json(request)) if !request.job_text.trim().is_empty() => request.job_text,
        Ok(_) => {
            return Json(pipeline::questions_or_fallback(Err(AppError::Validation(
                "job_text cannot be empty".to_string(),
            ))))
        }
        Err(rejection) => {
            return Json(pipeline::questions_or_fallback(Err(AppError::Validation(
                rejection.body_text(),
            ))))
        }
    };

    let result = run_gated(
        &state,
        "suggest",
        pipeline::suggest_questions(&state.config, state.llm.as_ref(), &job_text),
    )
    .await;

    Json(pipeline::questions_or_fallback(result))
}

/// POST /chat
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatBody>,
) -> Result<Json<ChatResponse>, AppError> {
    if request.question.trim().is_empty() {
        return Err(AppError::Validation("question cannot be empty".to_string()));
    }
    if request.history.iter().any(|m| m.role == Role::System) {
        return Err(AppError::Validation(
            "history may only contain user and assistant messages".to_string(),
        ));
    }

    let answer = run_gated(
        &state,
        "chat",
        pipeline::chat(
            &state.config,
            state.llm.as_ref(),
            &request.context,
            &request.question,
            &request.history,
        ),
    )
    .await?;

    Ok(Json(ChatResponse { answer }))
}

/// POST /generate-pdf
///
/// Returns the compiled resume as an attachment.
pub async fn handle_generate_pdf(
    State(state): State<AppState>,
    Json(request): Json<GeneratePdfRequest>,
) -> Result<Response, AppError> {
    let document = run_gated(
        &state,
        "render",
        pipeline::generate_pdf(
            &state.config,
            &state.compiler,
            &request.tailored_summary,
            &request.selected_projects,
        ),
    )
    .await?;

    let disposition = format!("attachment; filename=\"{}\"", document.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}
