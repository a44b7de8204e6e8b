//! Typed gateway operations on top of a [`GatewayInvoker`].
//!
//! Each operation names one remote tool, sends its fixed arguments, and picks
//! its payload out of the envelope through the ordered candidate list.

use std::collections::BTreeMap;
use std::sync::Arc;

use kontrol_core::agent::{AgentSummary, ConnectionCheck, DEFAULT_AGENT_MODEL};
use kontrol_core::cron::{JobsResponse, ScheduledJob};
use kontrol_core::gateway::{
    GatewayInvoker, InvocationError, Payload, RpcEnvelope, find_payload, unwrap_payload,
};
use kontrol_core::session::{GatewaySession, SessionMessage, SessionsResponse};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

pub const TOOL_SESSIONS_LIST: &str = "sessions_list";
pub const TOOL_SESSION_STATUS: &str = "session_status";
pub const TOOL_CRON: &str = "cron";
pub const TOOL_GATEWAY: &str = "gateway";
pub const TOOL_SESSIONS_HISTORY: &str = "sessions_history";
pub const TOOL_AGENTS_LIST: &str = "agents_list";
pub const TOOL_SESSIONS_SPAWN: &str = "sessions_spawn";

/// Messages fetched per session by the sessions listing.
const SESSION_MESSAGE_LIMIT: u32 = 2;

/// Keys kept by [`parse_runtime_info`].
const RUNTIME_KEYS: [&str; 4] = ["host", "os", "node", "model"];

static RUNTIME_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*Runtime:\s*(.+)$").expect("runtime line pattern is valid"));

/// Result of [`GatewayApi::spawn_session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnedSession {
    /// Key of the child session, or the tool's text output when no key was reported.
    pub session_key: String,
    pub output: String,
}

/// Gateway operations used by the sync loop and the one-shot commands.
///
/// Cheap to clone; clones share the invoker.
#[derive(Clone)]
pub struct GatewayApi {
    invoker: Arc<dyn GatewayInvoker>,
}

impl GatewayApi {
    pub fn new(invoker: Arc<dyn GatewayInvoker>) -> Self {
        Self { invoker }
    }

    /// Invokes `tool` and returns its highest-precedence payload.
    pub async fn invoke(&self, tool: &str, args: Value) -> Result<Option<Payload>, InvocationError> {
        let envelope = self.invoker.invoke(tool, args).await?;
        Ok(unwrap_payload(&envelope))
    }

    pub async fn fetch_sessions(&self) -> Result<Vec<GatewaySession>, InvocationError> {
        let envelope = self
            .invoker
            .invoke(TOOL_SESSIONS_LIST, json!({ "messageLimit": SESSION_MESSAGE_LIMIT }))
            .await?;
        find_payload(&envelope, |p| p.decode::<SessionsResponse>())
            .map(|response| response.sessions)
            .ok_or_else(|| missing_payload(TOOL_SESSIONS_LIST, &envelope))
    }

    /// Status summary text. Structured payloads are rendered as pretty JSON.
    pub async fn fetch_status(&self) -> Result<String, InvocationError> {
        let envelope = self.invoker.invoke(TOOL_SESSION_STATUS, json!({})).await?;
        unwrap_payload(&envelope)
            .map(|p| p.to_text())
            .ok_or_else(|| missing_payload(TOOL_SESSION_STATUS, &envelope))
    }

    /// Scheduled jobs. An envelope that mentions no jobs at all means there are none.
    pub async fn fetch_jobs(&self) -> Result<Vec<ScheduledJob>, InvocationError> {
        let envelope = self
            .invoker
            .invoke(TOOL_CRON, json!({ "action": "list", "includeDisabled": true }))
            .await?;

        let listed = find_payload(&envelope, |p| {
            let jobs = p.as_value()?.get("jobs")?;
            jobs.is_array().then(|| p.decode::<JobsResponse>())
        });

        match listed {
            Some(Some(response)) => Ok(response.jobs),
            Some(None) => Err(InvocationError::protocol(format!(
                "{}: jobs list does not match the expected shape",
                TOOL_CRON
            ))),
            None => Ok(Vec::new()),
        }
    }

    /// The gateway configuration document.
    ///
    /// `config.get` wraps the document as `result.raw`, either as a JSON string
    /// or inline; any other object is taken to be the document itself. A bare
    /// content wrapper (plain-text reply, no details) is not a document.
    pub async fn fetch_config(&self) -> Result<Value, InvocationError> {
        let envelope = self
            .invoker
            .invoke(TOOL_GATEWAY, json!({ "action": "config.get" }))
            .await?;
        find_payload(&envelope, |p| match p {
            Payload::Raw(value) if has_content_blocks(value) => None,
            _ => p.as_value().and_then(extract_config),
        })
        .unwrap_or_else(|| Err(missing_payload(TOOL_GATEWAY, &envelope)))
    }

    /// Transcript of one session, oldest first. Empty when the gateway returns none.
    pub async fn session_history(
        &self,
        session_key: &str,
        limit: u32,
        include_tools: bool,
    ) -> Result<Vec<SessionMessage>, InvocationError> {
        let envelope = self
            .invoker
            .invoke(
                TOOL_SESSIONS_HISTORY,
                json!({ "sessionKey": session_key, "limit": limit, "includeTools": include_tools }),
            )
            .await?;
        Ok(find_payload(&envelope, |p| decode_list(p, "messages")).unwrap_or_default())
    }

    /// Recent runs of a scheduled job, as reported by the gateway.
    pub async fn cron_runs(&self, job_id: &str) -> Result<Vec<Value>, InvocationError> {
        let envelope = self
            .invoker
            .invoke(TOOL_CRON, json!({ "action": "runs", "jobId": job_id }))
            .await?;
        Ok(find_payload(&envelope, |p| decode_list(p, "runs")).unwrap_or_default())
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentSummary>, InvocationError> {
        let envelope = self.invoker.invoke(TOOL_AGENTS_LIST, json!({})).await?;
        let agents = find_payload(&envelope, |p| {
            p.as_value()?.get("agents")?.as_array().cloned()
        })
        .unwrap_or_default();
        Ok(agents.iter().map(agent_summary).collect())
    }

    /// Starts a new session running `task`. Unset options use the gateway's defaults.
    pub async fn spawn_session(
        &self,
        task: &str,
        model: Option<&str>,
        label: Option<&str>,
    ) -> Result<SpawnedSession, InvocationError> {
        let mut args = Map::new();
        args.insert("task".into(), Value::String(task.to_string()));
        if let Some(model) = model {
            args.insert("model".into(), Value::String(model.to_string()));
        }
        if let Some(label) = label {
            args.insert("label".into(), Value::String(label.to_string()));
        }

        let envelope = self
            .invoker
            .invoke(TOOL_SESSIONS_SPAWN, Value::Object(args))
            .await?;

        let result = envelope.result.as_ref();
        let text = result
            .and_then(|r| r.get("content"))
            .and_then(Value::as_array)
            .and_then(|blocks| blocks.iter().find_map(|b| b.get("text")?.as_str()))
            .map(str::to_string);
        let details = result.and_then(|r| r.get("details"));
        let child_key = details
            .and_then(|d| d.get("childSessionKey"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let output = text.clone().unwrap_or_else(|| {
            details
                .map(Value::to_string)
                .unwrap_or_else(|| "{}".to_string())
        });
        Ok(SpawnedSession {
            session_key: child_key.or(text).unwrap_or_default(),
            output,
        })
    }

    /// Probes the gateway with a status fetch. Failures are reported, not returned.
    pub async fn test_connection(&self) -> ConnectionCheck {
        match self.fetch_status().await {
            Ok(_) => ConnectionCheck {
                ok: true,
                error: None,
            },
            Err(e) => ConnectionCheck {
                ok: false,
                error: Some(e.to_string()),
            },
        }
    }
}

fn missing_payload(tool: &str, envelope: &RpcEnvelope) -> InvocationError {
    let shape = match envelope.result.as_ref() {
        None | Some(Value::Null) => "no result",
        Some(Value::Object(_)) => "unrecognized object",
        Some(_) => "unexpected value",
    };
    InvocationError::protocol(format!("{}: {}", tool, shape))
}

fn has_content_blocks(value: &Value) -> bool {
    value.get("content").is_some_and(Value::is_array)
}

/// `None` when the candidate is not an object and the next one should be tried.
fn extract_config(candidate: &Value) -> Option<Result<Value, InvocationError>> {
    match candidate.get("result").and_then(|r| r.get("raw")) {
        Some(Value::String(raw)) => Some(serde_json::from_str(raw).map_err(|e| {
            InvocationError::protocol(format!("{}: raw config is not JSON: {}", TOOL_GATEWAY, e))
        })),
        Some(raw @ Value::Object(_)) => Some(Ok(raw.clone())),
        _ => candidate.is_object().then(|| Ok(candidate.clone())),
    }
}

/// Decodes `{ <field>: [...] }` or a bare array.
fn decode_list<T: serde::de::DeserializeOwned>(payload: &Payload, field: &str) -> Option<Vec<T>> {
    let value = payload.as_value()?;
    let list = match value {
        Value::Array(_) => value,
        Value::Object(map) => map.get(field).filter(|v| v.is_array())?,
        _ => return None,
    };
    serde_json::from_value(list.clone()).ok()
}

fn agent_summary(agent: &Value) -> AgentSummary {
    let configured = agent.get("configured");
    let field = |name: &str| configured.and_then(|c| c.get(name));
    let strings = |name: &str| -> Vec<String> {
        field(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    AgentSummary {
        name: agent
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        model: field("model")
            .and_then(|m| m.get("primary"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_AGENT_MODEL)
            .to_string(),
        workspace: field("workspace")
            .and_then(Value::as_str)
            .map(str::to_string),
        skills: strings("skills"),
        channels: strings("channels"),
    }
}

/// Parses the `Runtime: k=v | k=v` line of a status summary.
///
/// Only `host`, `os`, `node` and `model` are kept. Values may contain `=`.
pub fn parse_runtime_info(status_text: &str) -> BTreeMap<String, String> {
    let mut info = BTreeMap::new();
    let Some(line) = RUNTIME_LINE.captures(status_text).and_then(|c| c.get(1)) else {
        return info;
    };

    for pair in line.as_str().split('|') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if !value.is_empty() && RUNTIME_KEYS.contains(&key) {
            info.insert(key.to_string(), value.to_string());
        }
    }
    info
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replies per tool from a table and records every call.
    #[derive(Default)]
    pub(crate) struct TableInvoker {
        replies: Mutex<HashMap<String, Result<RpcEnvelope, InvocationError>>>,
        pub(crate) calls: Mutex<Vec<(String, Value)>>,
    }

    impl TableInvoker {
        pub(crate) fn reply(&self, tool: &str, reply: Result<RpcEnvelope, InvocationError>) {
            self.replies.lock().unwrap().insert(tool.to_string(), reply);
        }
    }

    #[async_trait]
    impl GatewayInvoker for TableInvoker {
        async fn invoke(&self, operation: &str, args: Value) -> Result<RpcEnvelope, InvocationError> {
            self.calls
                .lock()
                .unwrap()
                .push((operation.to_string(), args));
            self.replies
                .lock()
                .unwrap()
                .get(operation)
                .cloned()
                .unwrap_or_else(|| Err(InvocationError::http(404, "unknown tool")))
        }
    }

    fn api(invoker: &Arc<TableInvoker>) -> GatewayApi {
        GatewayApi::new(invoker.clone())
    }

    #[tokio::test]
    async fn test_fetch_sessions_from_text_or_details() {
        let invoker = Arc::new(TableInvoker::default());
        invoker.reply(
            TOOL_SESSIONS_LIST,
            Ok(RpcEnvelope::text(
                json!({ "count": 1, "sessions": [{ "key": "main", "updatedAt": 5 }] }).to_string(),
            )),
        );
        let sessions = api(&invoker).fetch_sessions().await.unwrap();
        assert_eq!(sessions[0].key, "main");
        assert_eq!(
            invoker.calls.lock().unwrap()[0],
            (TOOL_SESSIONS_LIST.to_string(), json!({ "messageLimit": 2 }))
        );

        invoker.reply(
            TOOL_SESSIONS_LIST,
            Ok(RpcEnvelope::success(json!({
                "content": [{ "type": "text", "text": "listing sessions" }],
                "details": { "sessions": [{ "key": "cron:daily", "kind": "cron" }] }
            }))),
        );
        let sessions = api(&invoker).fetch_sessions().await.unwrap();
        assert_eq!(sessions[0].key, "cron:daily");
        assert!(!sessions[0].kind.is_primary());
    }

    #[tokio::test]
    async fn test_fetch_sessions_without_payload_is_protocol_error() {
        let invoker = Arc::new(TableInvoker::default());
        invoker.reply(TOOL_SESSIONS_LIST, Ok(RpcEnvelope::text("nothing here")));
        let err = api(&invoker).fetch_sessions().await.unwrap_err();
        assert!(matches!(err, InvocationError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_fetch_status_text_and_structured() {
        let invoker = Arc::new(TableInvoker::default());
        invoker.reply(
            TOOL_SESSION_STATUS,
            Ok(RpcEnvelope::text("Runtime: host=box | os=linux")),
        );
        assert_eq!(
            api(&invoker).fetch_status().await.unwrap(),
            "Runtime: host=box | os=linux"
        );

        invoker.reply(TOOL_SESSION_STATUS, Ok(RpcEnvelope::success(json!({ "up": true }))));
        assert_eq!(
            api(&invoker).fetch_status().await.unwrap(),
            "{\n  \"up\": true\n}"
        );

        invoker.reply(TOOL_SESSION_STATUS, Ok(RpcEnvelope::success(Value::Null)));
        assert!(api(&invoker).fetch_status().await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_jobs_shapes() {
        let invoker = Arc::new(TableInvoker::default());
        invoker.reply(TOOL_CRON, Ok(RpcEnvelope::text("no jobs configured")));
        assert!(api(&invoker).fetch_jobs().await.unwrap().is_empty());

        invoker.reply(
            TOOL_CRON,
            Ok(RpcEnvelope::success(json!({
                "details": { "jobs": [{ "id": "brief", "schedule": { "expr": "0 6 * * *" } }] }
            }))),
        );
        let jobs = api(&invoker).fetch_jobs().await.unwrap();
        assert_eq!(jobs[0].schedule_display(), "0 6 * * *");

        invoker.reply(
            TOOL_CRON,
            Ok(RpcEnvelope::success(json!({ "jobs": [{ "name": "no id" }] }))),
        );
        let err = api(&invoker).fetch_jobs().await.unwrap_err();
        assert!(matches!(err, InvocationError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_fetch_config_unwraps_raw() {
        let invoker = Arc::new(TableInvoker::default());
        let wrapped = json!({
            "ok": true,
            "result": { "path": "/etc/gw.json", "exists": true, "raw": "{\"gateway\":{\"port\":18789}}" }
        });
        invoker.reply(TOOL_GATEWAY, Ok(RpcEnvelope::text(wrapped.to_string())));
        assert_eq!(
            api(&invoker).fetch_config().await.unwrap(),
            json!({ "gateway": { "port": 18789 } })
        );

        invoker.reply(
            TOOL_GATEWAY,
            Ok(RpcEnvelope::success(json!({ "details": { "agents": {} } }))),
        );
        assert_eq!(
            api(&invoker).fetch_config().await.unwrap(),
            json!({ "agents": {} })
        );

        invoker.reply(
            TOOL_GATEWAY,
            Ok(RpcEnvelope::text(json!({ "result": { "raw": "{oops" } }).to_string())),
        );
        assert!(matches!(
            api(&invoker).fetch_config().await.unwrap_err(),
            InvocationError::Protocol { .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_config_rejects_plain_text_reply() {
        let invoker = Arc::new(TableInvoker::default());
        invoker.reply(
            TOOL_GATEWAY,
            Ok(RpcEnvelope::text("config.get is not permitted for this token")),
        );
        let err = api(&invoker).fetch_config().await.unwrap_err();
        assert!(matches!(err, InvocationError::Protocol { .. }));

        invoker.reply(
            TOOL_GATEWAY,
            Ok(RpcEnvelope::success(json!({ "gateway": { "port": 1 } }))),
        );
        assert_eq!(
            api(&invoker).fetch_config().await.unwrap(),
            json!({ "gateway": { "port": 1 } })
        );
    }

    #[tokio::test]
    async fn test_remote_errors_pass_through() {
        let invoker = Arc::new(TableInvoker::default());
        invoker.reply(TOOL_SESSION_STATUS, Err(InvocationError::remote(None)));
        let check = api(&invoker).test_connection().await;
        assert!(!check.ok);
        assert_eq!(
            check.error.as_deref(),
            Some("gateway error: gateway reported an error")
        );
    }

    #[tokio::test]
    async fn test_history_and_runs_accept_bare_arrays() {
        let invoker = Arc::new(TableInvoker::default());
        invoker.reply(
            TOOL_SESSIONS_HISTORY,
            Ok(RpcEnvelope::text(
                json!([{ "role": "user", "text": "hi" }]).to_string(),
            )),
        );
        let history = api(&invoker)
            .session_history("main", 50, true)
            .await
            .unwrap();
        assert_eq!(history[0].display_text(), "hi");
        assert_eq!(
            invoker.calls.lock().unwrap()[0].1,
            json!({ "sessionKey": "main", "limit": 50, "includeTools": true })
        );

        invoker.reply(
            TOOL_CRON,
            Ok(RpcEnvelope::text(json!({ "runs": [{ "status": "ok" }] }).to_string())),
        );
        assert_eq!(api(&invoker).cron_runs("brief").await.unwrap().len(), 1);

        invoker.reply(TOOL_CRON, Ok(RpcEnvelope::text("never ran")));
        assert!(api(&invoker).cron_runs("brief").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_agents_maps_configured_block() {
        let invoker = Arc::new(TableInvoker::default());
        invoker.reply(
            TOOL_AGENTS_LIST,
            Ok(RpcEnvelope::text(
                json!({
                    "requester": "main",
                    "agents": [
                        { "id": "ops", "configured": {
                            "model": { "primary": "sonnet" },
                            "workspace": "/srv/ops",
                            "skills": ["deploy"],
                            "channels": ["telegram"]
                        }},
                        { "id": "bare" }
                    ]
                })
                .to_string(),
            )),
        );
        let agents = api(&invoker).list_agents().await.unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].model, "sonnet");
        assert_eq!(agents[0].workspace.as_deref(), Some("/srv/ops"));
        assert_eq!(agents[0].skills, vec!["deploy".to_string()]);
        assert_eq!(agents[1].model, DEFAULT_AGENT_MODEL);
        assert!(agents[1].channels.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_session_prefers_child_key() {
        let invoker = Arc::new(TableInvoker::default());
        invoker.reply(
            TOOL_SESSIONS_SPAWN,
            Ok(RpcEnvelope::success(json!({
                "content": [{ "type": "text", "text": "spawned" }],
                "details": { "childSessionKey": "agent:main:subagent:42" }
            }))),
        );
        let spawned = api(&invoker)
            .spawn_session("summarize inbox", None, Some("inbox"))
            .await
            .unwrap();
        assert_eq!(spawned.session_key, "agent:main:subagent:42");
        assert_eq!(spawned.output, "spawned");
        assert_eq!(
            invoker.calls.lock().unwrap()[0].1,
            json!({ "task": "summarize inbox", "label": "inbox" })
        );
    }

    #[test]
    fn test_parse_runtime_info() {
        let status = "Session: main\nRuntime: agent=main | host=gw-01 | os=linux 6.1 | node=v22.1.0 | model=opus | extra=a=b\nTokens: 10";
        let info = parse_runtime_info(status);
        assert_eq!(info.len(), 4);
        assert_eq!(info["host"], "gw-01");
        assert_eq!(info["os"], "linux 6.1");
        assert_eq!(info["node"], "v22.1.0");
        assert_eq!(info["model"], "opus");

        assert!(parse_runtime_info("no runtime here").is_empty());
    }
}
