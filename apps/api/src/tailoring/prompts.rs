//! Prompt builder: pure functions from (profile, job text, task) to prompt text.
//!
//! Job text is truncated to a character budget before it is embedded. The
//! cut is silent: anything past the budget never reaches the model.

use std::fmt::Write as _;

use serde_json::Value;
use tracing::debug;

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::models::Profile;

/// Which of the three model tasks a prompt is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Tailor,
    SuggestQuestions,
    Chat,
}

/// System prompt for the tailoring task.
pub const TAILOR_SYSTEM: &str = JSON_ONLY_SYSTEM;

/// Tailoring prompt. Placeholders: {grounding_instruction}, {profile},
/// {project_titles}, {job_text}.
pub const TAILOR_PROMPT_TEMPLATE: &str = r#"You are an expert technical recruiter and resume writer.
Compare the candidate profile with the job description and tailor the resume.

{grounding_instruction}

CANDIDATE PROFILE:
{profile}

PROJECT TITLES (choose from these EXACT titles only):
{project_titles}

JOB DESCRIPTION:
{job_text}

Return a JSON object with this EXACT schema (no extra fields):
{
  "role": "the job title being hired for",
  "skills_matched": ["skills from the profile that the job asks for"],
  "missing_skill": "the single most important skill the job wants that the profile lacks",
  "score": "match percentage, e.g. 72%",
  "tailored_summary": "a 2-3 sentence professional summary rewritten for this job",
  "selected_projects": ["2-3 project titles most relevant to this job"]
}"#;

pub const SUGGEST_SYSTEM: &str = JSON_ONLY_SYSTEM;

/// Question-suggestion prompt. Placeholders: {profile}, {job_text}.
pub const SUGGEST_PROMPT_TEMPLATE: &str = r#"A candidate is reading the job description below and will chat with an assistant that knows their profile.
Suggest exactly 3 short questions the candidate is most likely to ask about how they fit this job.

CANDIDATE PROFILE:
{profile}

JOB DESCRIPTION:
{job_text}

Return a JSON array of 3 strings, e.g. ["Do I meet the experience requirement?", "...", "..."]"#;

/// Chat system prompt. Placeholders: {grounding_instruction}, {profile}, {job_text}.
pub const CHAT_SYSTEM_TEMPLATE: &str = r#"You are a concise career assistant helping a candidate evaluate a job posting.
Answer the candidate's questions using the profile and the job description below.
Keep answers under 120 words and speak to the candidate directly.

{grounding_instruction}

CANDIDATE PROFILE:
{profile}

JOB DESCRIPTION:
{job_text}"#;

/// Returns at most `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            debug!(
                kept_chars = max_chars,
                dropped_bytes = text.len() - idx,
                "job text truncated"
            );
            &text[..idx]
        }
        None => text,
    }
}

/// Builds the prompt for `kind`. For `Chat` this is the system message; the
/// pipeline appends history and the new question as separate messages.
pub fn build_prompt(profile: &Profile, job_text: &str, kind: TaskKind, max_chars: usize) -> String {
    let job_text = truncate_chars(job_text.trim(), max_chars);
    let profile_text = describe_profile(profile);

    match kind {
        TaskKind::Tailor => {
            let titles = profile
                .project_titles()
                .iter()
                .map(|t| format!("- {t}"))
                .collect::<Vec<_>>()
                .join("\n");
            fill_template(
                TAILOR_PROMPT_TEMPLATE,
                &[
                    ("grounding_instruction", GROUNDING_INSTRUCTION),
                    ("profile", &profile_text),
                    ("project_titles", &titles),
                    ("job_text", job_text),
                ],
            )
        }
        TaskKind::SuggestQuestions => fill_template(
            SUGGEST_PROMPT_TEMPLATE,
            &[("profile", &profile_text), ("job_text", job_text)],
        ),
        TaskKind::Chat => fill_template(
            CHAT_SYSTEM_TEMPLATE,
            &[
                ("grounding_instruction", GROUNDING_INSTRUCTION),
                ("profile", &profile_text),
                ("job_text", job_text),
            ],
        ),
    }
}

/// Substitutes `{name}` placeholders in one pass over the template, so text
/// inserted for one placeholder is never scanned for another. Unknown
/// `{...}` spans (the JSON schema examples) are copied through.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Plain-text rendering of the profile for prompts. Sections come out in a
/// stable order so the same profile always yields the same prompt.
fn describe_profile(profile: &Profile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Name: {}", profile.name);
    let _ = writeln!(out, "Summary: {}", profile.summary);

    if !profile.skills.is_empty() {
        let skills = profile
            .skills
            .iter()
            .map(plain_value)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "Skills: {skills}");
    }

    if !profile.projects.is_empty() {
        let _ = writeln!(out, "Projects:");
        for project in &profile.projects {
            let _ = write!(out, "- {}", project.title);
            if !project.description.is_empty() {
                let _ = write!(out, ": {}", project.description);
            }
            if !project.tags.is_empty() {
                let _ = write!(out, " [{}]", project.tags.join(", "));
            }
            out.push('\n');
        }
    }

    for (section, value) in &profile.sections {
        let _ = writeln!(out, "{section}: {value}");
    }

    out.trim_end().to_string()
}

fn plain_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
