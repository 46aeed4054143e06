//! OpenWebUI chat payload types and their Markdown rendering.
//!
//! OpenWebUI keeps the whole conversation as a JSON document in the `chat`
//! column of its `chat` table:
//!
//! ```json
//! {
//!   "title": "Trip planning",
//!   "messages": [
//!     { "id": "…", "role": "user", "content": "Where to?", "timestamp": 1717200000 },
//!     { "id": "…", "role": "assistant", "content": "Lisbon.", "timestamp": 1717200004 }
//!   ]
//! }
//! ```
//!
//! Only the fields needed for the bookmark body are modelled; everything else is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::io::Write;

pub const MISSING_PAYLOAD_TEXT: &str = "[Chat JSON data missing in source database]";
pub const NO_MESSAGES_TEXT: &str = "[No messages found in chat JSON data]";

/// Epoch values above this are taken to be milliseconds (seconds would be past 2065).
const MILLIS_THRESHOLD: f64 = 3_000_000_000.0;

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: Option<String>,
    /// Usually a string; multimodal messages carry structured content.
    #[serde(default)]
    pub content: Option<Value>,
    /// Epoch seconds or milliseconds, depending on the OpenWebUI version.
    #[serde(default)]
    pub timestamp: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid chat JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to render chat: {0}")]
    Render(#[from] std::io::Error),
}

/// Turn the raw `chat` column into the Markdown body of a bookmark.
pub fn render_body(raw: Option<&str>) -> Result<String, DecodeError> {
    let raw = match raw.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return Ok(MISSING_PAYLOAD_TEXT.to_string()),
    };

    let payload: ChatPayload = serde_json::from_str(raw)?;
    if payload.messages.is_empty() {
        return Ok(NO_MESSAGES_TEXT.to_string());
    }

    let mut buf = Vec::new();
    write_conversation(&mut buf, &payload.messages)?;
    Ok(String::from_utf8_lossy(&buf).trim().to_string())
}

pub fn write_conversation<W: Write>(writer: &mut W, messages: &[ChatMessage]) -> std::io::Result<()> {
    for msg in messages {
        let role = capitalize(msg.role.as_deref().unwrap_or("unknown"));
        let content = match &msg.content {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        writeln!(writer, "**{}** ({}):", role, format_timestamp(msg.timestamp.as_ref()))?;
        writeln!(writer, "{}", content)?;
        writeln!(writer)?;
        writeln!(writer, "---")?;
        writeln!(writer)?;
    }
    Ok(())
}

fn format_timestamp(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "Timestamp N/A".to_string(),
        Some(Value::Number(n)) => {
            let Some(raw) = n.as_f64() else {
                return format!("Epoch: {}", n);
            };
            let secs = if raw > MILLIS_THRESHOLD { raw / 1000.0 } else { raw };
            DateTime::<Utc>::from_timestamp(secs.trunc() as i64, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| format!("Epoch: {}", n))
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// First letter upper-cased, the rest lower-cased (`"ASSISTANT"` → `"Assistant"`).
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_messages_in_order() {
        let raw = r#"{"messages": [
            {"role": "user", "content": "Where to?", "timestamp": 1717200000},
            {"role": "assistant", "content": "Lisbon.", "timestamp": 1717200004000}
        ]}"#;
        let body = render_body(Some(raw)).unwrap();
        assert_eq!(
            body,
            "**User** (2024-06-01 00:00:00 UTC):\nWhere to?\n\n---\n\n\
             **Assistant** (2024-06-01 00:00:04 UTC):\nLisbon.\n\n---"
        );
    }

    #[test]
    fn missing_fields_fall_back() {
        let raw = r#"{"messages": [{"content": null}, {"role": "SYSTEM", "timestamp": "noon"}]}"#;
        let body = render_body(Some(raw)).unwrap();
        assert!(body.starts_with("**Unknown** (Timestamp N/A):\n"));
        assert!(body.contains("**System** (noon):"));
    }

    #[test]
    fn structured_content_is_kept_as_json() {
        let raw = r#"{"messages": [{"role": "user", "content": [{"type": "text", "text": "hi"}]}]}"#;
        let body = render_body(Some(raw)).unwrap();
        assert!(body.contains(r#"[{"text":"hi","type":"text"}]"#) || body.contains(r#"[{"type":"text","text":"hi"}]"#));
    }

    #[test]
    fn placeholders_for_empty_payloads() {
        assert_eq!(render_body(None).unwrap(), MISSING_PAYLOAD_TEXT);
        assert_eq!(render_body(Some("  ")).unwrap(), MISSING_PAYLOAD_TEXT);
        assert_eq!(render_body(Some("{}")).unwrap(), NO_MESSAGES_TEXT);
        assert_eq!(render_body(Some(r#"{"messages": []}"#)).unwrap(), NO_MESSAGES_TEXT);
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        assert!(matches!(render_body(Some("{not json")), Err(DecodeError::Json(_))));
        assert!(render_body(Some(r#"{"messages": "oops"}"#)).is_err());
    }

    struct Full;

    impl Write for Full {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::StorageFull.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_errors_are_returned() {
        let payload: ChatPayload = serde_json::from_str(r#"{"messages": [{"role": "user"}]}"#).unwrap();
        let err = write_conversation(&mut Full, &payload.messages).unwrap_err();
        let err = DecodeError::from(err);
        assert!(err.to_string().starts_with("failed to render chat"));
    }

    #[test]
    fn capitalize_matches_title_case_of_roles() {
        assert_eq!(capitalize("assistant"), "Assistant");
        assert_eq!(capitalize("ASSISTANT"), "Assistant");
        assert_eq!(capitalize(""), "");
    }
}
