//! Pulls the assistant text out of a chat-completion envelope.

use serde_json::Value;

/// Envelope layouts seen from chat-completion providers, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeShape {
    /// `{choices: [{message: {content}}]}`
    MessageContent,
    /// `{choices: [{text}]}`
    TextContent,
    /// `{choices: [{delta: {content}}]}`
    DeltaContent,
}

impl EnvelopeShape {
    pub const ORDER: [EnvelopeShape; 3] = [
        EnvelopeShape::MessageContent,
        EnvelopeShape::TextContent,
        EnvelopeShape::DeltaContent,
    ];

    fn pointer(self) -> &'static str {
        match self {
            EnvelopeShape::MessageContent => "/message/content",
            EnvelopeShape::TextContent => "/text",
            EnvelopeShape::DeltaContent => "/delta/content",
        }
    }

    /// Text for this shape from one `choices` entry, if present and non-blank.
    pub fn extract(self, choice: &Value) -> Option<String> {
        choice.pointer(self.pointer()).and_then(content_text)
    }
}

fn content_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        // Structured content: [{type: "text", text: "..."}, ...]
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect::<Vec<_>>()
            .join(""),
        _ => return None,
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn first_choice(envelope: &Value) -> Option<&Value> {
    envelope.get("choices").and_then(Value::as_array).and_then(|c| c.first())
}

/// The shape that yielded content, if any.
pub fn matched_shape(envelope: &Value) -> Option<EnvelopeShape> {
    let choice = first_choice(envelope)?;
    EnvelopeShape::ORDER
        .into_iter()
        .find(|shape| shape.extract(choice).is_some())
}

/// Assistant text from the envelope, or an empty string when nothing usable is there.
pub fn extract_content(envelope: &Value) -> String {
    first_choice(envelope)
        .and_then(|choice| EnvelopeShape::ORDER.into_iter().find_map(|shape| shape.extract(choice)))
        .unwrap_or_default()
}
