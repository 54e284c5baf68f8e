pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::tailoring::handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .route("/analyze", post(handlers::handle_analyze))
        .route("/suggest-questions", post(handlers::handle_suggest_questions))
        .route("/chat", post(handlers::handle_chat))
        .route("/generate-pdf", post(handlers::handle_generate_pdf))
        .with_state(state)
}
