use std::sync::Arc;

use crate::config::Config;
use crate::gate::JobGate;
use crate::llm_client::ChatModel;
use crate::render::DocumentCompiler;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Chat model behind the inference endpoint. A trait object so tests can
    /// script responses.
    pub llm: Arc<dyn ChatModel>,
    /// One gated job at a time, process-wide.
    pub gate: JobGate,
    pub compiler: DocumentCompiler,
}
