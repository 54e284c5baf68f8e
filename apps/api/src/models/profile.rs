use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("could not read profile at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("profile is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate project title '{0}' (titles must be unique ignoring case and surrounding whitespace)")]
    DuplicateProject(String),
}

/// The candidate's master profile. Read-only on disk; loaded fresh for each
/// gated job and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub summary: String,
    /// Either plain strings or grouped objects; passed through to the template as-is.
    #[serde(default)]
    pub skills: Vec<Value>,
    #[serde(default)]
    pub projects: Vec<Project>,
    /// Every other top-level section (contact, experience, education, ...).
    #[serde(flatten)]
    pub sections: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Freeform project fields such as `link` or `dates`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Identity key for project titles: trimmed and lowercased.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

impl Project {
    pub fn key(&self) -> String {
        normalize_title(&self.title)
    }
}

impl Profile {
    pub fn from_json(raw: &str) -> Result<Self, ProfileError> {
        let profile: Profile = serde_json::from_str(raw)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Rejects profiles whose project titles collide after normalization.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let mut seen = HashSet::new();
        for project in &self.projects {
            if !seen.insert(project.key()) {
                return Err(ProfileError::DuplicateProject(project.title.clone()));
            }
        }
        Ok(())
    }

    pub fn project_titles(&self) -> Vec<&str> {
        self.projects.iter().map(|p| p.title.as_str()).collect()
    }
}

/// Loads a snapshot of the profile document from disk.
pub async fn load_profile(path: &Path) -> Result<Profile, ProfileError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Profile::from_json(&raw)
}
