// Shared prompt fragments and response schemas.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting pieces.

use serde_json::{json, Value};

/// Fallback name used when a prompt is built without a candidate name.
pub const CANDIDATE_NAME_FALLBACK: &str = "Inspector Candidate";

/// Fallback contact line used when a prompt is built without contact details.
pub const CONTACT_FALLBACK: &str = "Contact details available upon request";

/// Response schema constraining output to a JSON array of strings.
pub fn string_array_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": { "type": "STRING" }
    })
}

/// Renders a list as markdown bullets, one per line.
pub fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("* {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
