//! Profile merge & filter: folds the model's tailoring output into a fresh
//! view of the base profile. The base profile is never modified.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::models::{normalize_title, Profile, Project};

/// Merged data handed to the template renderer. Built per render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    pub name: String,
    pub summary: String,
    pub skills: Vec<Value>,
    pub projects: Vec<Project>,
    pub sections: Map<String, Value>,
}

/// Merges a tailored summary and a project selection into `base`.
///
/// A blank `tailored_summary` keeps the base summary. Projects are filtered by
/// normalized title in their original order; if nothing matches, every
/// project is kept.
pub fn merge<S: AsRef<str>>(base: &Profile, tailored_summary: &str, selected_titles: &[S]) -> RenderContext {
    let summary = if tailored_summary.trim().is_empty() {
        base.summary.clone()
    } else {
        tailored_summary.trim().to_string()
    };

    RenderContext {
        name: base.name.clone(),
        summary,
        skills: base.skills.clone(),
        projects: filter_projects(&base.projects, selected_titles),
        sections: base.sections.clone(),
    }
}

/// Keeps the projects whose normalized title is in `selected_titles`,
/// falling back to the full list when the selection matches nothing.
pub fn filter_projects<S: AsRef<str>>(projects: &[Project], selected_titles: &[S]) -> Vec<Project> {
    let wanted: HashSet<String> = selected_titles
        .iter()
        .map(|t| normalize_title(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect();

    let kept: Vec<Project> = projects
        .iter()
        .filter(|p| wanted.contains(&p.key()))
        .cloned()
        .collect();

    if kept.is_empty() {
        projects.to_vec()
    } else {
        kept
    }
}

impl RenderContext {
    /// Template data: every profile section plus the merged fields, which take
    /// precedence over any same-named freeform section.
    pub fn into_template_data(self) -> Value {
        let mut data = self.sections;
        data.insert("name".to_string(), Value::String(self.name));
        data.insert("summary".to_string(), Value::String(self.summary));
        data.insert("skills".to_string(), Value::Array(self.skills));
        data.insert(
            "projects".to_string(),
            Value::Array(self.projects.into_iter().map(project_value).collect()),
        );
        Value::Object(data)
    }
}

fn project_value(project: Project) -> Value {
    let mut fields = project.extra;
    fields.insert("title".to_string(), Value::String(project.title));
    fields.insert("description".to_string(), Value::String(project.description));
    fields.insert(
        "tags".to_string(),
        Value::Array(project.tags.into_iter().map(Value::String).collect()),
    );
    Value::Object(fields)
}
