use crate::db::open_db;
use crate::store::{NewTrace, SqliteTraceStore};
use crate::TraceError;
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// What the chatbot logger sends. Query and response may be plain strings or
/// message lists; lists are stored as compact JSON.
#[derive(Deserialize)]
struct TracePayload {
    #[serde(default)]
    user_query: Value,
    #[serde(default)]
    bot_response: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

fn stored_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn payload_to_trace(payload: TracePayload) -> Result<NewTrace, TraceError> {
    let user_query = stored_text(&payload.user_query);
    let bot_response = stored_text(&payload.bot_response);
    if user_query.is_empty() && bot_response.is_empty() {
        return Err(TraceError::InvalidTrace(
            "trace needs a user_query or a bot_response".into(),
        ));
    }
    let metadata = match payload.metadata {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    };
    Ok(NewTrace {
        user_query,
        bot_response,
        error: payload.error.filter(|e| !e.is_empty()),
        metadata,
    })
}

pub fn parse_payload(input: &str) -> Result<NewTrace, TraceError> {
    let payload: TracePayload = serde_json::from_str(input)?;
    payload_to_trace(payload)
}

pub fn handle_record(db_path: &Path) -> Result<(), TraceError> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let trace = parse_payload(&input)?;

    let store = SqliteTraceStore::new(open_db(db_path)?);
    let id = store.insert_trace(&trace)?;

    println!("{id}");
    eprintln!("tracereview: recorded trace {id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_strings_stored_verbatim() {
        let t = parse_payload(r#"{"user_query":"Quick vegan breakfast?","bot_response":"Oatmeal"}"#)
            .unwrap();
        assert_eq!(t.user_query, "Quick vegan breakfast?");
        assert_eq!(t.bot_response, "Oatmeal");
        assert!(t.error.is_none());
        assert!(t.metadata.is_none());
    }

    #[test]
    fn message_lists_stored_as_json() {
        let t = parse_payload(
            r#"{"user_query":[{"role":"user","content":"hi"}],"bot_response":[{"role":"assistant","content":"hello"}],"metadata":{"model":"gpt-4o-mini"}}"#,
        )
        .unwrap();
        // object keys come back sorted
        assert_eq!(t.user_query, r#"[{"content":"hi","role":"user"}]"#);
        assert_eq!(t.bot_response, r#"[{"content":"hello","role":"assistant"}]"#);
        assert_eq!(t.metadata.as_deref(), Some(r#"{"model":"gpt-4o-mini"}"#));
    }

    #[test]
    fn failed_call_keeps_error() {
        let t = parse_payload(r#"{"user_query":"q","bot_response":"","error":"rate limited"}"#).unwrap();
        assert_eq!(t.bot_response, "");
        assert_eq!(t.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn empty_trace_rejected() {
        assert!(matches!(
            parse_payload(r#"{"user_query":"","bot_response":null}"#),
            Err(TraceError::InvalidTrace(_))
        ));
        assert!(matches!(parse_payload("{}"), Err(TraceError::InvalidTrace(_))));
    }

    #[test]
    fn invalid_json_rejected() {
        assert!(matches!(parse_payload("not json"), Err(TraceError::Json(_))));
    }
}
