use serde_json::Value;

pub(crate) const ELLIPSIS: char = '…';

pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Coerces an optional JSON value to trimmed text. Missing and null become empty,
/// other non-strings are stringified.
pub(crate) fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    }
}

/// First non-blank candidate, trimmed.
pub(crate) fn first_filled<'a>(candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    candidates
        .into_iter()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Truncates to `max` characters, marking the cut with an ellipsis.
pub(crate) fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push(ELLIPSIS);
    out
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text up to and including the first period that is followed by whitespace.
pub(crate) fn first_sentence(s: &str) -> String {
    let collapsed = collapse_whitespace(s);
    match collapsed.find(". ") {
        Some(idx) => collapsed[..=idx].to_string(),
        None => collapsed,
    }
}
