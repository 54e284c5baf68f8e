//! Document compiler adapter: runs an external LaTeX compiler over rendered source.
//!
//! The compiler runs as one batch process per call inside the shared working
//! directory. By default that is `pdflatex` in a TeX Live container with the
//! working directory mounted at `/data`.
//!
//! Success means: the process exited with status 0 AND the artifact exists.
//! Files left by an earlier job are removed before the run (a job cancelled
//! mid-compile never reaches its own cleanup), and the exit status is checked
//! before the artifact is read.
//!
//! The working directory is not locked here; callers hold the job gate.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use bytes::Bytes;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// File stem shared by the source, artifact and compiler side files.
pub const JOB_STEM: &str = "resume";
const SIDE_FILE_EXTENSIONS: [&str; 5] = ["tex", "pdf", "aux", "log", "out"];
const DIAGNOSTIC_EXCERPT_CHARS: usize = 1500;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("document compilation failed (exit code {}): {excerpt}", describe_exit(.exit_code))]
    Failed {
        exit_code: Option<i32>,
        excerpt: String,
    },

    #[error("document compilation timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("compiler exited successfully but produced no {0}")]
    MissingArtifact(PathBuf),

    #[error("could not start compiler '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("working directory error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "none, killed by signal".to_string(), |c| c.to_string())
}

/// How to invoke the compiler. `{work_dir}`, `{source}` and `{stem}` in
/// `args` are replaced per run.
#[derive(Debug, Clone)]
pub struct CompilerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl CompilerCommand {
    /// `pdflatex` inside a container with the working directory mounted.
    pub fn docker_pdflatex(image: &str) -> Self {
        Self {
            program: "docker".to_string(),
            args: [
                "run",
                "--rm",
                "--network",
                "none",
                "-v",
                "{work_dir}:/data",
                "-w",
                "/data",
                image,
                "pdflatex",
                "-interaction=nonstopmode",
                "-halt-on-error",
                "{source}",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }

    fn resolved_args(&self, work_dir: &Path) -> Vec<String> {
        let work_dir = work_dir.to_string_lossy();
        let source = format!("{JOB_STEM}.tex");
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{work_dir}", &work_dir)
                    .replace("{source}", &source)
                    .replace("{stem}", JOB_STEM)
            })
            .collect()
    }
}

/// Binary artifact handed back to the caller. Never cached.
#[derive(Debug, Clone)]
pub struct CompiledDocument {
    pub bytes: Bytes,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct DocumentCompiler {
    work_dir: PathBuf,
    command: CompilerCommand,
    timeout: Duration,
}

fn io_err(path: &Path, source: std::io::Error) -> CompileError {
    CompileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl DocumentCompiler {
    pub fn new(work_dir: PathBuf, command: CompilerCommand, timeout: Duration) -> Self {
        Self {
            work_dir,
            command,
            timeout,
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.work_dir.join(format!("{JOB_STEM}.tex"))
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.work_dir.join(format!("{JOB_STEM}.pdf"))
    }

    /// Writes `source`, runs the compiler, and reads back the artifact.
    /// Transient files are left in place; call [`DocumentCompiler::cleanup`].
    pub async fn compile(&self, source: &str, filename: &str) -> Result<CompiledDocument, CompileError> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| io_err(&self.work_dir, e))?;
        // Container mounts need an absolute host path.
        let work_dir = tokio::fs::canonicalize(&self.work_dir)
            .await
            .map_err(|e| io_err(&self.work_dir, e))?;

        for path in self.side_files() {
            remove_if_present(&path).await?;
        }
        let artifact = self.artifact_path();

        let source_path = self.source_path();
        tokio::fs::write(&source_path, source)
            .await
            .map_err(|e| io_err(&source_path, e))?;

        let args = self.command.resolved_args(&work_dir);
        debug!(program = %self.command.program, ?args, "starting document compiler");
        let started = Instant::now();

        let run = Command::new(&self.command.program)
            .args(&args)
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "document compiler timed out; process killed");
                return Err(CompileError::TimedOut(self.timeout));
            }
            Ok(result) => result.map_err(|source| CompileError::Spawn {
                program: self.command.program.clone(),
                source,
            })?,
        };

        if !output.status.success() {
            let excerpt = diagnostic_excerpt(&output.stderr, &output.stdout);
            warn!(exit_code = ?output.status.code(), "document compiler failed");
            return Err(CompileError::Failed {
                exit_code: output.status.code(),
                excerpt,
            });
        }

        let bytes = match tokio::fs::read(&artifact).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CompileError::MissingArtifact(artifact));
            }
            Err(e) => return Err(io_err(&artifact, e)),
        };

        info!(
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document compiled"
        );

        Ok(CompiledDocument {
            bytes: Bytes::from(bytes),
            filename: filename.to_string(),
        })
    }

    fn side_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        SIDE_FILE_EXTENSIONS
            .iter()
            .map(|ext| self.work_dir.join(format!("{JOB_STEM}.{ext}")))
    }

    /// Removes the source, artifact and compiler side files of the last run.
    pub async fn cleanup(&self) {
        for path in self.side_files() {
            if let Err(e) = remove_if_present(&path).await {
                warn!("failed to clean up compiler file: {e}");
            }
        }
    }
}

async fn remove_if_present(path: &Path) -> Result<(), CompileError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}

/// Tail of stderr, or of stdout when stderr is empty (pdflatex reports errors
/// on stdout).
fn diagnostic_excerpt(stderr: &[u8], stdout: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);
    let text = if stderr.trim().is_empty() { stdout } else { stderr };
    let text = text.trim();

    let total = text.chars().count();
    if total <= DIAGNOSTIC_EXCERPT_CHARS {
        return text.to_string();
    }
    let skip = total - DIAGNOSTIC_EXCERPT_CHARS;
    let start = text.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(0);
    format!("…{}", &text[start..])
}
