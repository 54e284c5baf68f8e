//! Structured response extraction: pulls one JSON value out of raw model text.
//!
//! Two stages, each testable on its own:
//! 1. [`select_payload`] picks the span to parse: the first fenced block tagged
//!    `json`, else the first fenced block of any kind, else the whole text.
//! 2. [`extract_json`] parses that span strictly. Anything that is not exactly
//!    one JSON value is an error; there is no partial recovery.
//!
//! Only one layer of fencing is understood. Fences nested inside a fenced
//! block are not unwrapped.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::llm_client::excerpt;

const FENCE: &str = "```";
const ERROR_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("model output is not valid JSON ({reason}); began with: {excerpt:?}")]
    Parse { reason: String, excerpt: String },

    /// Valid JSON that does not have the shape the call site expects.
    #[error("model output has an unexpected shape: {0}")]
    Schema(String),
}

/// A fenced span inside model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Info string after the opening fence (`json`, `latex`, ...), possibly empty.
    pub tag: &'a str,
    /// Trimmed content between the fences.
    pub content: &'a str,
}

impl FencedBlock<'_> {
    pub fn is_json(&self) -> bool {
        self.tag.eq_ignore_ascii_case("json")
    }
}

/// Finds every top-level fenced block in order of appearance. An opening
/// fence with no closing fence runs to the end of the text.
pub fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find(FENCE) {
        let after_open = cursor + rel + FENCE.len();
        let tag_end = after_open + info_tag_len(&text[after_open..]);
        let tag = &text[after_open..tag_end];

        match text[tag_end..].find(FENCE) {
            Some(close_rel) => {
                let close = tag_end + close_rel;
                blocks.push(FencedBlock {
                    tag,
                    content: text[tag_end..close].trim(),
                });
                cursor = close + FENCE.len();
            }
            None => {
                blocks.push(FencedBlock {
                    tag,
                    content: text[tag_end..].trim(),
                });
                break;
            }
        }
    }

    blocks
}

/// Length in bytes of the info string directly after an opening fence.
/// A run of word characters only counts as a tag when whitespace or the start
/// of a JSON container follows it; otherwise it is content (```true```).
fn info_tag_len(after_open: &str) -> usize {
    let end = after_open
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.')))
        .unwrap_or(after_open.len());
    match after_open[end..].chars().next() {
        Some(c) if c.is_whitespace() || c == '{' || c == '[' => end,
        _ => 0,
    }
}

/// Stage 1: choose the span of `raw` that should hold the JSON payload.
pub fn select_payload(raw: &str) -> &str {
    let blocks = fenced_blocks(raw);
    blocks
        .iter()
        .find(|b| b.is_json())
        .or_else(|| blocks.first())
        .map(|b| b.content)
        .unwrap_or(raw)
}

/// Stage 2: strict parse of the selected span.
pub fn extract_json(raw: &str) -> Result<Value, ExtractError> {
    let payload = select_payload(raw);
    serde_json::from_str(payload.trim()).map_err(|e| ExtractError::Parse {
        reason: e.to_string(),
        excerpt: excerpt(payload.trim(), ERROR_EXCERPT_CHARS).to_string(),
    })
}

/// Extracts a JSON value and deserializes it into the call site's schema.
pub fn extract_as<T: DeserializeOwned>(raw: &str) -> Result<T, ExtractError> {
    let value = extract_json(raw)?;
    serde_json::from_value(value).map_err(|e| ExtractError::Schema(e.to_string()))
}
