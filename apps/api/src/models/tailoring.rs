use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Structured output of the tailoring call. `role`, `score` and
/// `tailored_summary` are required; the list fields and `missing_skill`
/// default to empty when the model leaves them out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailoringResult {
    pub role: String,
    #[serde(default)]
    pub skills_matched: Vec<String>,
    #[serde(default)]
    pub missing_skill: String,
    /// Always rendered as a percentage string, e.g. `"82%"`.
    #[serde(deserialize_with = "deserialize_score")]
    pub score: String,
    pub tailored_summary: String,
    #[serde(default)]
    pub selected_projects: Vec<String>,
}

/// Accepts `"82%"`, `"82"`, `82` or `82.4` and normalises to `"82%"`.
fn deserialize_score<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) => percentage(f),
            None => Err(serde::de::Error::custom("score is not a finite number")),
        },
        Value::String(s) => {
            let trimmed = s.trim().trim_end_matches('%').trim();
            match trimmed.parse::<f64>() {
                Ok(f) => percentage(f),
                // Leave unusual phrasing ("high") untouched rather than failing the job.
                Err(_) => Ok(s.trim().to_string()),
            }
        }
        other => Err(serde::de::Error::custom(format!(
            "score must be a string or number, got {other}"
        ))),
    }
}

fn percentage<E: serde::de::Error>(score: f64) -> Result<String, E> {
    if !score.is_finite() {
        return Err(E::custom(format!("score is not a finite number: {score}")));
    }
    Ok(format!("{}%", score.round() as i64))
}
