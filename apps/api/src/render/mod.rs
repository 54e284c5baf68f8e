// Rendering: profile data → LaTeX source → compiled PDF.
// The template engine and escaping are pure; only the compiler touches disk
// and processes, and it relies on the job gate for exclusive use of the
// working directory.

pub mod compiler;
pub mod escape;
pub mod template;

use std::path::Path;

pub use compiler::{CompileError, CompiledDocument, CompilerCommand, DocumentCompiler};
pub use template::{render_template, TemplateError};

/// Built-in resume template, used when no template path is configured.
pub const DEFAULT_RESUME_TEMPLATE: &str = include_str!("../../templates/resume.tex");

/// Reads the template source: the configured file, or the built-in template.
pub async fn load_template_source(path: Option<&Path>) -> std::io::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path).await,
        None => Ok(DEFAULT_RESUME_TEMPLATE.to_string()),
    }
}
