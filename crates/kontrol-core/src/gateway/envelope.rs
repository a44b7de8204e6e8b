//! The gateway's response envelope and the ordered-attempt payload unwrap.
//!
//! The same logical payload arrives in at least three nestings:
//!
//! ```text
//! { ok, result: { content: [{ type: "text", text: "<json or plain text>" }], details: {...} } }
//! { ok, result: { details: {...} } }
//! { ok, result: {...} }
//! ```
//!
//! [`payload_candidates`] lists every nesting present, in precedence order, and
//! [`unwrap_payload`] returns the first one.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::InvocationError;

/// Top-level wrapper returned by `POST /tools/invoke`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcEnvelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl RpcEnvelope {
    /// A successful envelope carrying `result`.
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    /// A successful envelope whose result is a single text content block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::success(serde_json::json!({
            "content": [{ "type": "text", "text": text.into() }]
        }))
    }

    /// A failed envelope with the given error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(serde_json::json!({ "message": message.into() })),
        }
    }

    /// Extracts the error message from `error.message`, or from `error` when it is a bare string.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::String(message) => Some(message.clone()),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    /// Converts an `ok: false` envelope into [`InvocationError::Remote`].
    pub fn into_checked(self) -> Result<Self, InvocationError> {
        if self.ok {
            Ok(self)
        } else {
            Err(InvocationError::remote(self.error_message()))
        }
    }
}

/// One unwrapped payload candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A text block that is not JSON; several operations return plain text.
    Text(String),
    /// JSON decoded from a text block, or the `details` object.
    Structured(Value),
    /// The envelope's `result`, as-is.
    Raw(Value),
}

impl Payload {
    /// The JSON value of a structured or raw candidate.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Text(_) => None,
            Payload::Structured(value) | Payload::Raw(value) => Some(value),
        }
    }

    /// The candidate rendered as display text. JSON is pretty-printed.
    pub fn to_text(&self) -> String {
        match self {
            Payload::Text(text) => text.clone(),
            Payload::Structured(Value::String(s)) | Payload::Raw(Value::String(s)) => s.clone(),
            Payload::Structured(value) | Payload::Raw(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }

    /// Deserializes a structured or raw candidate into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        self.as_value()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Parses a text block. JSON that decodes to a string gets a second pass, since
/// some tools double-encode their output.
fn parse_text_block(text: &str) -> Payload {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
            Ok(Value::String(s)) => Payload::Text(s),
            Ok(value) => Payload::Structured(value),
            Err(_) => Payload::Text(inner),
        },
        Ok(value) => Payload::Structured(value),
        Err(_) => Payload::Text(text.to_string()),
    }
}

fn first_text_block(result: &Value) -> Option<&str> {
    result
        .get("content")?
        .as_array()?
        .iter()
        .find_map(|block| block.get("text").and_then(Value::as_str))
}

/// Every payload nesting present in the envelope, highest precedence first:
/// content text, then `details`, then `result` itself.
pub fn payload_candidates(envelope: &RpcEnvelope) -> Vec<Payload> {
    let Some(result) = envelope.result.as_ref().filter(|r| !r.is_null()) else {
        return Vec::new();
    };

    let mut candidates = Vec::with_capacity(3);
    if let Some(text) = first_text_block(result) {
        candidates.push(parse_text_block(text));
    }
    if let Some(details) = result.get("details").filter(|d| d.is_object()) {
        candidates.push(Payload::Structured(details.clone()));
    }
    candidates.push(Payload::Raw(result.clone()));
    candidates
}

/// The highest-precedence payload in the envelope.
pub fn unwrap_payload(envelope: &RpcEnvelope) -> Option<Payload> {
    payload_candidates(envelope).into_iter().next()
}

/// Returns the first candidate accepted by `extract`.
pub fn find_payload<T>(
    envelope: &RpcEnvelope,
    mut extract: impl FnMut(&Payload) -> Option<T>,
) -> Option<T> {
    payload_candidates(envelope).iter().find_map(|p| extract(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_json_takes_precedence_over_details() {
        let envelope = RpcEnvelope::success(json!({
            "content": [{ "type": "text", "text": "{\"sessions\": [], \"count\": 0}" }],
            "details": { "sessions": [{ "key": "stale" }] }
        }));

        assert_eq!(
            unwrap_payload(&envelope),
            Some(Payload::Structured(json!({ "sessions": [], "count": 0 })))
        );
        assert_eq!(payload_candidates(&envelope).len(), 3);
    }

    #[test]
    fn test_double_encoded_text_is_parsed_twice() {
        let inner = json!({ "jobs": [{ "id": "a" }] }).to_string();
        let outer = serde_json::to_string(&inner).unwrap();
        let envelope = RpcEnvelope::text(outer);

        assert_eq!(
            unwrap_payload(&envelope),
            Some(Payload::Structured(json!({ "jobs": [{ "id": "a" }] })))
        );
    }

    #[test]
    fn test_plain_text_is_a_payload_not_an_error() {
        let envelope = RpcEnvelope::text("Runtime: agent=main | host=box");
        assert_eq!(
            unwrap_payload(&envelope),
            Some(Payload::Text("Runtime: agent=main | host=box".into()))
        );
    }

    #[test]
    fn test_details_then_raw_fallback() {
        let envelope = RpcEnvelope::success(json!({ "details": { "jobs": [] } }));
        let candidates = payload_candidates(&envelope);
        assert_eq!(candidates[0], Payload::Structured(json!({ "jobs": [] })));
        assert!(matches!(candidates[1], Payload::Raw(_)));

        let flat = RpcEnvelope::success(json!({ "sessions": [] }));
        assert_eq!(
            unwrap_payload(&flat),
            Some(Payload::Raw(json!({ "sessions": [] })))
        );
    }

    #[test]
    fn test_missing_result_has_no_candidates() {
        let envelope = RpcEnvelope {
            ok: true,
            result: None,
            error: None,
        };
        assert!(unwrap_payload(&envelope).is_none());
    }

    #[test]
    fn test_find_payload_skips_unusable_candidates() {
        let envelope = RpcEnvelope::success(json!({
            "content": [{ "type": "text", "text": "not json" }],
            "details": { "count": 3 }
        }));
        let count = find_payload(&envelope, |p| p.as_value()?.get("count")?.as_u64());
        assert_eq!(count, Some(3));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            RpcEnvelope::failure("denied").into_checked().unwrap_err(),
            InvocationError::Remote {
                message: "denied".into()
            }
        );

        let bare: RpcEnvelope =
            serde_json::from_value(json!({ "ok": false, "error": "quota" })).unwrap();
        assert_eq!(bare.error_message().as_deref(), Some("quota"));

        let silent: RpcEnvelope = serde_json::from_value(json!({ "ok": false })).unwrap();
        assert!(matches!(
            silent.into_checked(),
            Err(InvocationError::Remote { message }) if message == super::super::error::GENERIC_REMOTE_ERROR
        ));
    }
}
