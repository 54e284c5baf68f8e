/// LLM Client: the single point of entry for all inference calls.
///
/// ARCHITECTURAL RULE: No other module may call the inference endpoint directly.
/// All model interactions go through the [`ChatModel`] trait.
///
/// The endpoint speaks the OpenAI-compatible chat-completions shape:
/// request `{model, messages, temperature?}`, response `{choices:[{message:{content}}]}`.
/// One call per invocation. There is no retry loop here: failures surface to the
/// caller, which turns them into a single user-visible error.
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod extract;
pub mod prompts;

/// Longest slice of an error body carried into an error message.
const ERROR_BODY_EXCERPT: usize = 500;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Network failure, transport timeout, or a non-2xx status.
    #[error("inference endpoint unavailable: {0}")]
    Unavailable(String),

    /// A 2xx response that does not carry `choices[0].message.content`.
    #[error("inference response malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Body sent to the chat-completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Anything that can answer a chat request with raw text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

/// HTTP client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(url: String, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            url,
            api_key,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn send(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let started = Instant::now();

        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(describe_transport_error(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Unavailable(describe_transport_error(&e)))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "inference endpoint returned an error status");
            return Err(LlmError::Unavailable(format!(
                "status {}: {}",
                status.as_u16(),
                excerpt(&body, ERROR_BODY_EXCERPT)
            )));
        }

        let completion: ChatCompletion = serde_json::from_str(&body)
            .map_err(|e| LlmError::Malformed(format!("unexpected body shape: {e}")))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Malformed("response has no choices".to_string()))?
            .message
            .content
            .ok_or_else(|| LlmError::Malformed("first choice has no content".to_string()))?;

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            response_chars = text.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "inference call succeeded"
        );

        Ok(text)
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("could not connect: {e}")
    } else {
        e.to_string()
    }
}

/// First `max` characters of `text`, never splitting a code point.
pub(crate) fn excerpt(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1/chat/completions")
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "test-model".to_string(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hello")],
            temperature: Some(0.2),
        }
    }

    fn client(url: String) -> LlmClient {
        LlmClient::new(url, Some("sk-test".to_string()), Duration::from_secs(5))
    }

    #[test]
    fn test_request_serializes_openai_shape() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(value["model"], "test-model");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hello");
        assert!((value["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_request_omits_absent_temperature() {
        let mut req = request();
        req.temperature = None;
        let value = serde_json::to_value(req).unwrap();
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("hi", 10), "hi");
    }

    #[tokio::test]
    async fn test_send_returns_first_choice_content() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "test-model");
                Json(json!({
                    "choices": [
                        {"message": {"role": "assistant", "content": "first"}},
                        {"message": {"role": "assistant", "content": "second"}}
                    ]
                }))
            }),
        );
        let url = serve(router).await;

        let text = client(url).send(&request()).await.unwrap();
        assert_eq!(text, "first");
    }

    #[tokio::test]
    async fn test_non_success_status_is_unavailable_and_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/v1/chat/completions",
                post(|State(calls): State<Arc<AtomicUsize>>| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::SERVICE_UNAVAILABLE, "overloaded")
                }),
            )
            .with_state(calls.clone());
        let url = serve(router).await;

        let err = client(url).send(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(ref msg) if msg.contains("503")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_choices_is_malformed() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let url = serve(router).await;

        let err = client(url).send(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_malformed() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"output": "text"})) }),
        );
        let url = serve(router).await;

        let err = client(url).send(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_null_content_is_malformed() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": [{"message": {"content": null}}]})) }),
        );
        let url = serve(router).await;

        let err = client(url).send(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_transport_timeout_is_unavailable() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"choices": [{"message": {"content": "late"}}]}))
            }),
        );
        let url = serve(router).await;

        let client = LlmClient::new(url, None, Duration::from_millis(100));
        let err = client.send(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{addr}/v1/chat/completions"))
            .send(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Unavailable(_)));
    }
}
