//! LaTeX-friendly templates on top of minijinja.
//!
//! Jinja syntax with delimiters that do not collide with LaTeX braces:
//!
//! | Construct | Syntax                                         |
//! |-----------|------------------------------------------------|
//! | Variable  | `\VAR{summary}`, `\VAR{p.title \| e}`          |
//! | Block     | `\BLOCK{for p in projects}` … `\BLOCK{endfor}` |
//! | Comment   | `\#{ ignored }`                                |
//!
//! A missing value renders as the empty string, dotted paths included. A
//! `for` over a missing or non-sequence value is a render error. `e` and
//! `escape` apply LaTeX escaping; nothing is escaped unless asked for.
//! Arrays print comma-joined and objects print as compact JSON.
//!
//! A single newline directly after a block tag or comment is dropped, so tags
//! on their own line do not leave blank lines (which LaTeX reads as paragraph
//! breaks).

use std::borrow::Cow;
use std::fmt::Write as _;
use std::ops::Range;

use minijinja::syntax::SyntaxConfig;
use minijinja::value::ValueKind;
use minijinja::{
    escape_formatter, AutoEscape, Environment, Error as JinjaError, ErrorKind, Output, State,
    UndefinedBehavior, Value as JinjaValue,
};
use serde_json::Value;
use thiserror::Error;

use crate::render::escape::escape_latex;

const VAR_START: &str = "\\VAR{";
const BLOCK_START: &str = "\\BLOCK{";
const COMMENT_START: &str = "\\#{";
const TAG_END: &str = "}";

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("template syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("template render error on line {line}: {message}")]
    Render { line: usize, message: String },
}

impl From<JinjaError> for TemplateError {
    fn from(err: JinjaError) -> Self {
        let line = err.line().unwrap_or(0);
        let message = err
            .detail()
            .map(str::to_string)
            .unwrap_or_else(|| err.kind().to_string());

        match err.kind() {
            ErrorKind::SyntaxError
            | ErrorKind::BadEscape
            | ErrorKind::InvalidDelimiter
            | ErrorKind::UnknownFilter
            | ErrorKind::UnknownTest
            | ErrorKind::UnknownFunction => TemplateError::Syntax { line, message },
            _ => TemplateError::Render { line, message },
        }
    }
}

/// Renders `source` against `data`.
pub fn render_template(source: &str, data: &Value) -> Result<String, TemplateError> {
    let source = guard_loop_sources(source);
    let env = environment()?;
    let template = env.template_from_str(&source)?;
    Ok(template.render(data)?)
}

fn environment<'source>() -> Result<Environment<'source>, TemplateError> {
    let syntax = SyntaxConfig::builder()
        .block_delimiters(BLOCK_START, TAG_END)
        .variable_delimiters(VAR_START, TAG_END)
        .comment_delimiters(COMMENT_START, TAG_END)
        .build()?;

    let mut env = Environment::new();
    env.set_syntax(syntax);
    env.set_trim_blocks(true);
    env.set_keep_trailing_newline(true);
    env.set_undefined_behavior(UndefinedBehavior::Chainable);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_formatter(format_value);
    env.add_filter("e", escape_filter);
    env.add_filter("escape", escape_filter);
    env.add_filter(LOOP_SOURCE_FILTER, loop_source);
    Ok(env)
}

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

/// Text form of a value: none and undefined are empty, arrays are
/// comma-joined, objects are compact JSON.
fn plain_text(value: &JinjaValue) -> String {
    match value.kind() {
        ValueKind::Undefined | ValueKind::None => String::new(),
        ValueKind::Seq => match value.try_iter() {
            Ok(items) => items.map(|item| plain_text(&item)).collect::<Vec<_>>().join(", "),
            Err(_) => String::new(),
        },
        ValueKind::Map => serde_json::to_string(value).unwrap_or_default(),
        _ => match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        },
    }
}

fn format_value(out: &mut Output, state: &State, value: &JinjaValue) -> Result<(), JinjaError> {
    match value.kind() {
        ValueKind::None | ValueKind::Seq | ValueKind::Map => out
            .write_str(&plain_text(value))
            .map_err(|_| JinjaError::from(ErrorKind::WriteFailure)),
        _ => escape_formatter(out, state, value),
    }
}

fn escape_filter(value: &JinjaValue) -> String {
    escape_latex(&plain_text(value)).into_owned()
}

// ────────────────────────────────────────────────────────────────────────────
// Loop sources
// ────────────────────────────────────────────────────────────────────────────

/// Filter that every `for` source is routed through. minijinja alone iterates
/// a missing value as empty; a loop must find a sequence instead.
const LOOP_SOURCE_FILTER: &str = "loop_source";

fn loop_source(value: &JinjaValue, name: &str) -> Result<JinjaValue, JinjaError> {
    match value.kind() {
        ValueKind::Seq | ValueKind::Map | ValueKind::Iterable => Ok(value.clone()),
        ValueKind::Undefined | ValueKind::None => Err(JinjaError::new(
            ErrorKind::UndefinedError,
            format!("'{name}' is not defined"),
        )),
        kind => Err(JinjaError::new(
            ErrorKind::InvalidOperation,
            format!("'{name}' is not a sequence (found {kind})"),
        )),
    }
}

/// Byte range of the iterable expression inside a `for` tag body.
fn loop_source_span(body: &str) -> Option<Range<usize>> {
    let marker = |c: char| c == '-' || c == '+' || c.is_whitespace();
    let lead = body.len() - body.trim_start_matches(marker).len();
    let trail = body.trim_end_matches(marker).len();
    if lead >= trail {
        return None;
    }

    let statement = &body[lead..trail];
    if !statement.starts_with("for ") {
        return None;
    }
    let in_at = statement.find(" in ")? + " in ".len();
    let mut expr = &statement[in_at..];
    if let Some(cond) = expr.find(" if ") {
        expr = &expr[..cond];
    }
    let expr = expr.trim_end();
    let expr = expr.strip_suffix(" recursive").unwrap_or(expr).trim_end();

    let start = lead + in_at + (expr.len() - expr.trim_start().len());
    let end = lead + in_at + expr.len();
    (start < end).then_some(start..end)
}

/// Rewrites `for x in EXPR` into `for x in (EXPR) | loop_source("EXPR")`.
/// No newlines are added, so error line numbers still match the source.
fn guard_loop_sources(source: &str) -> Cow<'_, str> {
    let mut out = String::new();
    let mut copied = 0;

    for (pos, _) in source.match_indices(BLOCK_START) {
        let body_start = pos + BLOCK_START.len();
        if body_start <= copied {
            continue;
        }
        let Some(len) = source[body_start..].find(TAG_END) else {
            continue;
        };
        let Some(span) = loop_source_span(&source[body_start..body_start + len]) else {
            continue;
        };

        let (start, end) = (body_start + span.start, body_start + span.end);
        let expr = &source[start..end];
        let name = expr.replace('\\', "\\\\").replace('"', "\\\"");
        out.push_str(&source[copied..start]);
        let _ = write!(out, "({expr}) | {LOOP_SOURCE_FILTER}(\"{name}\")");
        copied = end;
    }

    if copied == 0 {
        return Cow::Borrowed(source);
    }
    out.push_str(&source[copied..]);
    Cow::Owned(out)
}
