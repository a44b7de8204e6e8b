//! Agents configured on the gateway.

use serde::{Deserialize, Serialize};

/// Model reported for agents that do not configure one.
pub const DEFAULT_AGENT_MODEL: &str = "default";

/// One entry of `agents_list`, flattened from its `configured` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub name: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// Outcome of a connectivity probe. Never an error by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCheck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
