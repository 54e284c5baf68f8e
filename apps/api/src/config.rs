use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every setting has a default so the service can start against a local
/// OpenAI-compatible endpoint with no `.env` at all.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub inference_url: String,
    pub inference_api_key: Option<String>,
    pub inference_model: String,
    pub inference_timeout: Duration,
    pub profile_path: PathBuf,
    /// Overrides the built-in resume template when set.
    pub template_path: Option<PathBuf>,
    /// Shared scratch directory for rendered source and compiler output.
    pub work_dir: PathBuf,
    pub compiler_image: String,
    pub compile_timeout: Duration,
    /// Upper bound on queueing + body for every gated job.
    pub job_timeout: Duration,
    pub max_job_text_chars: usize,
}

const DEFAULT_INFERENCE_URL: &str = "http://localhost:11434/v1/chat/completions";
const DEFAULT_INFERENCE_MODEL: &str = "llama3.1";
const DEFAULT_COMPILER_IMAGE: &str = "texlive/texlive:latest";

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. `from_env` is the
    /// production caller; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            port: get("PORT", "8000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: get("RUST_LOG", "info"),
            inference_url: get("INFERENCE_URL", DEFAULT_INFERENCE_URL),
            inference_api_key: lookup("INFERENCE_API_KEY").filter(|k| !k.trim().is_empty()),
            inference_model: get("INFERENCE_MODEL", DEFAULT_INFERENCE_MODEL),
            inference_timeout: parse_secs(&get("INFERENCE_TIMEOUT_SECS", "60"), "INFERENCE_TIMEOUT_SECS")?,
            profile_path: PathBuf::from(get("PROFILE_PATH", "data/profile.json")),
            template_path: lookup("TEMPLATE_PATH").map(PathBuf::from),
            work_dir: PathBuf::from(get("WORK_DIR", "build")),
            compiler_image: get("COMPILER_IMAGE", DEFAULT_COMPILER_IMAGE),
            compile_timeout: parse_secs(&get("COMPILE_TIMEOUT_SECS", "90"), "COMPILE_TIMEOUT_SECS")?,
            job_timeout: parse_secs(&get("JOB_TIMEOUT_SECS", "180"), "JOB_TIMEOUT_SECS")?,
            max_job_text_chars: get("MAX_JOB_TEXT_CHARS", "7000")
                .parse::<usize>()
                .context("MAX_JOB_TEXT_CHARS must be a non-negative integer")?,
        })
    }
}

fn parse_secs(raw: &str, key: &str) -> Result<Duration> {
    let secs = raw
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number of seconds"))?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.inference_url, DEFAULT_INFERENCE_URL);
        assert!(config.inference_api_key.is_none());
        assert!(config.template_path.is_none());
        assert_eq!(config.compile_timeout, Duration::from_secs(90));
        assert_eq!(config.max_job_text_chars, 7000);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9090"),
            ("INFERENCE_MODEL", "qwen2.5"),
            ("INFERENCE_API_KEY", "sk-test"),
            ("TEMPLATE_PATH", "/tmp/custom.tex"),
            ("JOB_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.inference_model, "qwen2.5");
        assert_eq!(config.inference_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.template_path, Some(PathBuf::from("/tmp/custom.tex")));
        assert_eq!(config.job_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_api_key_is_treated_as_absent() {
        let config = Config::from_lookup(lookup_from(&[("INFERENCE_API_KEY", "  ")])).unwrap();
        assert!(config.inference_api_key.is_none());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "not-a-port")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let err =
            Config::from_lookup(lookup_from(&[("COMPILE_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("COMPILE_TIMEOUT_SECS"));
    }
}
