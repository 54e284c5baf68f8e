//! Tailoring pipeline: the bodies of the four gated jobs.
//!
//! Flow for a PDF: load profile → prompt → model → extract → merge → render → compile.
//! `analyze` covers the first half and `generate_pdf` the second, with the
//! browser extension carrying the analysis between the two calls.
//!
//! Every function here assumes the caller holds the job gate.

use std::collections::HashSet;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::llm_client::extract::{extract_as, ExtractError};
use crate::llm_client::{ChatMessage, ChatModel, ChatRequest, LlmError, Role};
use crate::models::{load_profile, normalize_title, TailoringResult};
use crate::render::{load_template_source, render_template, CompiledDocument, DocumentCompiler};
use crate::tailoring::merge::merge;
use crate::tailoring::prompts::{build_prompt, TaskKind, SUGGEST_SYSTEM, TAILOR_SYSTEM};

const TAILOR_TEMPERATURE: f32 = 0.2;
const SUGGEST_TEMPERATURE: f32 = 0.4;
const CHAT_TEMPERATURE: f32 = 0.5;
const MAX_QUESTIONS: usize = 3;

/// Served whenever question suggestion fails for any reason.
pub const FALLBACK_QUESTIONS: [&str; 3] = [
    "Am I a good fit for this role?",
    "Which of my skills match this job best?",
    "What should I learn to be a stronger candidate?",
];

/// Runs the tailoring prompt and returns the model's structured result.
pub async fn analyze(config: &Config, llm: &dyn ChatModel, job_text: &str) -> Result<TailoringResult, AppError> {
    let profile = load_profile(&config.profile_path).await?;
    let prompt = build_prompt(&profile, job_text, TaskKind::Tailor, config.max_job_text_chars);

    let request = ChatRequest {
        model: config.inference_model.clone(),
        messages: vec![ChatMessage::system(TAILOR_SYSTEM), ChatMessage::user(prompt)],
        temperature: Some(TAILOR_TEMPERATURE),
    };
    let raw = llm.send(&request).await?;
    let result: TailoringResult = extract_as(&raw)?;

    let known: HashSet<String> = profile.projects.iter().map(|p| p.key()).collect();
    let unknown: Vec<&str> = result
        .selected_projects
        .iter()
        .filter(|t| !known.contains(&normalize_title(t)))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        warn!(?unknown, "model selected project titles that are not in the profile");
    }

    info!(
        role = %result.role,
        score = %result.score,
        selected = result.selected_projects.len(),
        "analysis complete"
    );
    Ok(result)
}

/// Model output for question suggestion: a bare array or `{"questions": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuggestedQuestions {
    List(Vec<Value>),
    Wrapped { questions: Vec<Value> },
}

/// Asks the model for up to three questions the candidate might ask.
pub async fn suggest_questions(config: &Config, llm: &dyn ChatModel, job_text: &str) -> Result<Vec<String>, AppError> {
    let profile = load_profile(&config.profile_path).await?;
    let prompt = build_prompt(&profile, job_text, TaskKind::SuggestQuestions, config.max_job_text_chars);

    let request = ChatRequest {
        model: config.inference_model.clone(),
        messages: vec![ChatMessage::system(SUGGEST_SYSTEM), ChatMessage::user(prompt)],
        temperature: Some(SUGGEST_TEMPERATURE),
    };
    let raw = llm.send(&request).await?;

    let items = match extract_as::<SuggestedQuestions>(&raw)? {
        SuggestedQuestions::List(items) | SuggestedQuestions::Wrapped { questions: items } => items,
    };
    let questions: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .take(MAX_QUESTIONS)
        .map(String::from)
        .collect();

    if questions.is_empty() {
        return Err(ExtractError::Schema("no usable questions in model output".to_string()).into());
    }
    Ok(questions)
}

/// The one degrading path: any failure becomes the fixed fallback list.
pub fn questions_or_fallback(result: Result<Vec<String>, AppError>) -> Vec<String> {
    match result {
        Ok(questions) => questions,
        Err(e) => {
            warn!("question suggestion failed, serving fallback list: {e}");
            FALLBACK_QUESTIONS.iter().map(|q| q.to_string()).collect()
        }
    }
}

/// Answers a question about the job, replaying prior turns in order.
pub async fn chat(
    config: &Config,
    llm: &dyn ChatModel,
    context: &str,
    question: &str,
    history: &[ChatMessage],
) -> Result<String, AppError> {
    let profile = load_profile(&config.profile_path).await?;
    let system = build_prompt(&profile, context, TaskKind::Chat, config.max_job_text_chars);

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
    messages.push(ChatMessage::user(question.trim()));

    let request = ChatRequest {
        model: config.inference_model.clone(),
        messages,
        temperature: Some(CHAT_TEMPERATURE),
    };
    let answer = llm.send(&request).await?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(LlmError::Malformed("model returned an empty answer".to_string()).into());
    }
    Ok(answer.to_string())
}

/// Merges the analysis into the profile, renders LaTeX, and compiles it.
/// Compiler scratch files are removed before returning, on success or failure.
pub async fn generate_pdf(
    config: &Config,
    compiler: &DocumentCompiler,
    tailored_summary: &str,
    selected_projects: &[String],
) -> Result<CompiledDocument, AppError> {
    let profile = load_profile(&config.profile_path).await?;
    let context = merge(&profile, tailored_summary, selected_projects);
    info!(
        projects = context.projects.len(),
        tailored = !tailored_summary.trim().is_empty(),
        "render context built"
    );

    let source = load_template_source(config.template_path.as_deref())
        .await
        .with_context(|| format!("could not read template {:?}", config.template_path))?;
    let latex = render_template(&source, &context.into_template_data())?;

    let result = compiler.compile(&latex, &artifact_filename(&profile.name)).await;
    compiler.cleanup().await;
    Ok(result?)
}

/// `"Jane Doe"` → `"Jane_Doe_Resume.pdf"`; falls back to `"Resume.pdf"`.
pub fn artifact_filename(name: &str) -> String {
    let stem = name
        .split_whitespace()
        .map(|word| word.chars().filter(|c| c.is_alphanumeric() || *c == '-').collect::<String>())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if stem.is_empty() {
        "Resume.pdf".to_string()
    } else {
        format!("{stem}_Resume.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, ScriptedModel};

    #[test]
    fn test_artifact_filename() {
        assert_eq!(artifact_filename("Jane Doe"), "Jane_Doe_Resume.pdf");
        assert_eq!(artifact_filename("  José  O'Neil "), "José_ONeil_Resume.pdf");
        assert_eq!(artifact_filename(""), "Resume.pdf");
        assert_eq!(artifact_filename("../.."), "Resume.pdf");
    }

    #[tokio::test]
    async fn test_analyze_parses_fenced_result() {
        let fx = fixture();
        let model = ScriptedModel::new(vec![Ok(r#"Here you go:
```json
{"role": "Backend Engineer", "skills_matched": ["Rust"], "missing_skill": "Kafka",
 "score": 74, "tailored_summary": "Rust backend engineer.", "selected_projects": ["beta"]}
```"#
            .to_string())]);

        let result = analyze(&fx.config, &model, "We need Rust").await.unwrap();
        assert_eq!(result.role, "Backend Engineer");
        assert_eq!(result.score, "74%");
        assert_eq!(result.selected_projects, vec!["beta"]);

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "test-model");
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert!(requests[0].messages[1].content.contains("We need Rust"));
    }

    #[tokio::test]
    async fn test_analyze_reports_schema_error() {
        let fx = fixture();
        let model = ScriptedModel::new(vec![Ok(r#"{"role": "SRE"}"#.to_string())]);
        let err = analyze(&fx.config, &model, "job").await.unwrap_err();
        assert!(matches!(err, AppError::Extraction(ExtractError::Schema(_))));
    }

    #[tokio::test]
    async fn test_analyze_reports_extraction_error() {
        let fx = fixture();
        let model = ScriptedModel::new(vec![Ok("I cannot help with that.".to_string())]);
        let err = analyze(&fx.config, &model, "job").await.unwrap_err();
        assert!(matches!(err, AppError::Extraction(ExtractError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_analyze_propagates_inference_failure_without_retry() {
        let fx = fixture();
        let model = ScriptedModel::new(vec![Err(LlmError::Unavailable("down".into()))]);
        let err = analyze(&fx.config, &model, "job").await.unwrap_err();
        assert!(matches!(err, AppError::Inference(LlmError::Unavailable(_))));
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_suggest_questions_takes_at_most_three() {
        let fx = fixture();
        let model = ScriptedModel::new(vec![Ok(r#"["Q1", " ", "Q2", "Q3", "Q4"]"#.to_string())]);
        let questions = suggest_questions(&fx.config, &model, "job").await.unwrap();
        assert_eq!(questions, vec!["Q1", "Q2", "Q3"]);
    }

    #[tokio::test]
    async fn test_suggest_questions_accepts_wrapped_object() {
        let fx = fixture();
        let model = ScriptedModel::new(vec![Ok(r#"{"questions": ["Only one?"]}"#.to_string())]);
        let questions = suggest_questions(&fx.config, &model, "job").await.unwrap();
        assert_eq!(questions, vec!["Only one?"]);
    }

    #[tokio::test]
    async fn test_suggest_questions_falls_back_on_any_failure() {
        let fx = fixture();
        for script in [
            Err(LlmError::Unavailable("down".into())),
            Ok("not json".to_string()),
            Ok("[]".to_string()),
            Ok(r#"{"other": 1}"#.to_string()),
        ] {
            let model = ScriptedModel::new(vec![script]);
            let questions = questions_or_fallback(suggest_questions(&fx.config, &model, "job").await);
            assert_eq!(questions, FALLBACK_QUESTIONS.to_vec());
        }
    }

    #[tokio::test]
    async fn test_chat_replays_history_in_order() {
        let fx = fixture();
        let model = ScriptedModel::new(vec![Ok("  You match most requirements.  ".to_string())]);
        let history = vec![
            ChatMessage::user("Do I know Rust?"),
            ChatMessage {
                role: Role::Assistant,
                content: "Yes.".to_string(),
            },
        ];

        let answer = chat(&fx.config, &model, "Job page text", "Am I a fit?", &history)
            .await
            .unwrap();
        assert_eq!(answer, "You match most requirements.");

        let sent = &model.requests()[0].messages;
        let roles: Vec<Role> = sent.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert!(sent[0].content.contains("Job page text"));
        assert_eq!(sent[3].content, "Am I a fit?");
    }

    #[tokio::test]
    async fn test_chat_empty_answer_is_malformed() {
        let fx = fixture();
        let model = ScriptedModel::new(vec![Ok("   ".to_string())]);
        let err = chat(&fx.config, &model, "ctx", "q", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Inference(LlmError::Malformed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_pdf_renders_selected_projects_and_cleans_up() {
        let fx = fixture();
        let compiler = fx.echo_compiler();

        let doc = generate_pdf(&fx.config, &compiler, "New & improved summary", &["BETA".to_string()])
            .await
            .unwrap();

        let latex = String::from_utf8(doc.bytes.to_vec()).unwrap();
        assert!(latex.contains(r"New \& improved summary"));
        assert!(latex.contains("Beta"));
        assert!(!latex.contains("Alpha"));
        assert!(!latex.contains("Gamma"));
        assert_eq!(doc.filename, "Jane_Doe_Resume.pdf");
        assert!(!compiler.source_path().exists());
        assert!(!compiler.artifact_path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generate_pdf_without_selection_keeps_every_project() {
        let fx = fixture();
        let compiler = fx.echo_compiler();

        let doc = generate_pdf(&fx.config, &compiler, "", &[]).await.unwrap();
        let latex = String::from_utf8(doc.bytes.to_vec()).unwrap();
        for title in ["Alpha", "Beta", "Gamma"] {
            assert!(latex.contains(title), "{title} missing");
        }
        assert!(latex.contains("old summary"));
    }

    #[tokio::test]
    async fn test_generate_pdf_reports_template_errors() {
        let mut fx = fixture();
        let template = fx.dir.path().join("broken.tex");
        std::fs::write(&template, r"\BLOCK{for p in experience}\BLOCK{endfor}").unwrap();
        fx.config.template_path = Some(template);

        let err = generate_pdf(&fx.config, &fx.echo_compiler(), "", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Template(crate::render::TemplateError::Render { .. })));
    }

    #[tokio::test]
    async fn test_missing_profile_is_profile_error() {
        let mut fx = fixture();
        fx.config.profile_path = fx.dir.path().join("missing.json");
        let model = ScriptedModel::new(vec![]);
        let err = analyze(&fx.config, &model, "job").await.unwrap_err();
        assert!(matches!(err, AppError::Profile(_)));
        assert!(model.requests().is_empty());
    }
}
