//! Test doubles shared by pipeline and route tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::Config;
use crate::llm_client::{ChatModel, ChatRequest, LlmError};
use crate::render::{CompilerCommand, DocumentCompiler};

pub const PROFILE_JSON: &str = r#"{
    "name": "Jane Doe",
    "summary": "old summary",
    "skills": ["Rust", "SQL"],
    "projects": [
        {"title": "Alpha", "description": "First thing", "tags": ["rust"]},
        {"title": "Beta", "description": "Second thing", "tags": ["sql"]},
        {"title": "Gamma", "description": "Third thing", "tags": []}
    ]
}"#;

/// Replays queued responses in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    /// Sleeps before every answer.
    pub fn slow(responses: Vec<Result<String, LlmError>>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(responses)
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn send(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Unavailable("script exhausted".to_string())))
    }
}

/// A temp directory holding a profile, plus a config pointing at it.
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let profile_path = dir.path().join("profile.json");
    std::fs::write(&profile_path, PROFILE_JSON).unwrap();

    let mut config = Config::from_lookup(|_| None).unwrap();
    config.inference_model = "test-model".to_string();
    config.profile_path = profile_path;
    config.work_dir = dir.path().join("build");
    config.job_timeout = Duration::from_secs(10);

    Fixture { dir, config }
}

impl Fixture {
    /// A compiler that copies the rendered source to the artifact path.
    pub fn echo_compiler(&self) -> DocumentCompiler {
        self.compiler("cp {source} {stem}.pdf")
    }

    pub fn compiler(&self, script: &str) -> DocumentCompiler {
        DocumentCompiler::new(
            self.config.work_dir.clone(),
            CompilerCommand {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
            },
            Duration::from_secs(10),
        )
    }
}
