//! Strict JSON recovery for model output.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    // Greedy: from the first brace/bracket to the last matching closer.
    static ref JSON_SPAN: Regex = Regex::new(r"(?s)(\{.*\}|\[.*\])").expect("JSON span pattern is valid");
}

/// Parses model text as a JSON object or array.
///
/// Tries the whole string first, then the first greedy `{...}`/`[...]` span.
/// Both attempts are strict; anything else yields `None`.
pub fn parse_model_json(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    strict(text).or_else(|| JSON_SPAN.find(text).and_then(|span| strict(span.as_str())))
}

fn strict(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(|value| value.is_object() || value.is_array())
}
