use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether a session is the gateway's primary conversation or one it spawned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionKind {
    #[default]
    Main,
    /// Any non-primary kind, keeping the gateway's own label.
    Spawned(String),
}

impl From<String> for SessionKind {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("main") {
            SessionKind::Main
        } else {
            SessionKind::Spawned(value)
        }
    }
}

impl From<SessionKind> for String {
    fn from(kind: SessionKind) -> Self {
        match kind {
            SessionKind::Main => "main".to_string(),
            SessionKind::Spawned(label) => label,
        }
    }
}

impl SessionKind {
    pub fn is_primary(&self) -> bool {
        matches!(self, SessionKind::Main)
    }
}

/// A conversational unit on the gateway, as reported by `sessions_list`.
///
/// `key` is unique within one snapshot. Fields the dashboard does not model are
/// kept in `extra` so they can still take part in fingerprinting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySession {
    pub key: String,
    #[serde(default)]
    pub kind: SessionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub display_name: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub last_channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_messages: Option<Vec<SessionMessage>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GatewaySession {
    /// A session with only the identifying fields set.
    pub fn new(key: impl Into<String>, updated_at: i64) -> Self {
        Self {
            key: key.into(),
            kind: SessionKind::Main,
            label: None,
            display_name: String::new(),
            updated_at,
            model: String::new(),
            context_tokens: None,
            total_tokens: None,
            last_channel: String::new(),
            session_id: None,
            channel: None,
            last_messages: None,
            extra: Map::new(),
        }
    }

    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.updated_at).single()
    }

    /// Label shown in listings: display name, then label, then key.
    pub fn title(&self) -> &str {
        if !self.display_name.is_empty() {
            &self.display_name
        } else {
            self.label.as_deref().unwrap_or(&self.key)
        }
    }
}

/// The `sessions_list` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionsResponse {
    #[serde(default)]
    pub count: Option<usize>,
    pub sessions: Vec<GatewaySession>,
}

/// One message of a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Either a plain string or an array of content blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl SessionMessage {
    /// Best-effort plain text of the message.
    pub fn display_text(&self) -> String {
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            return text.to_string();
        }
        match &self.content {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(blocks)) => blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }
}

/// A tool call recorded in a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}
