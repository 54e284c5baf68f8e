// Shared prompt fragments.
// Task-specific prompts live in tailoring::prompts; this file only holds
// cross-cutting instructions reused by more than one task.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT include explanations or apologies.";

/// Instruction appended to every prompt that sees the candidate profile.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Only state facts that appear in the candidate profile. \
    Do NOT invent employers, projects, metrics, or skills. \
    If the profile does not support a claim, leave it out.";
