//! Classification of stored query/response text into plain text or a
//! role/content transcript.

use crate::pyliteral;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    PlainText(String),
    Transcript(Vec<Message>),
}

impl Content {
    pub fn is_transcript(&self) -> bool {
        matches!(self, Content::Transcript(_))
    }
}

/// Decide how a stored field should be shown. Never fails: anything that is
/// not a non-empty list starting with a `{role, content}` mapping is plain text.
pub fn classify(raw: &str) -> Content {
    match parse_structured(raw) {
        Some(Value::Array(items)) if starts_with_message(&items) => {
            Content::Transcript(items.iter().map(to_message).collect())
        }
        _ => Content::PlainText(raw.to_string()),
    }
}

fn parse_structured(raw: &str) -> Option<Value> {
    let trimmed = raw.trim_start();
    // Only containers can be transcripts; skip parsing prose entirely.
    if !trimmed.starts_with('[') && !trimmed.starts_with('(') {
        return None;
    }
    serde_json::from_str(raw)
        .ok()
        .or_else(|| pyliteral::parse(raw).ok())
}

fn starts_with_message(items: &[Value]) -> bool {
    match items.first() {
        Some(Value::Object(first)) => first.contains_key("role") && first.contains_key("content"),
        _ => false,
    }
}

fn to_message(item: &Value) -> Message {
    match item {
        Value::Object(map) => Message {
            role: map
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            text: map.get("content").map(value_text).unwrap_or_default(),
        },
        other => Message {
            role: String::new(),
            text: value_text(other),
        },
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// "assistant" -> "Assistant". Empty roles fall back to "Message".
pub fn display_role(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Message".into(),
    }
}
