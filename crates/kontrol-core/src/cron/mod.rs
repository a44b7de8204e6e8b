//! Scheduled jobs and schedule normalization.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Display string for a schedule that cannot be described.
pub const UNKNOWN_SCHEDULE: &str = "unknown schedule";

/// Structured schedule object as sent by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<String>,
}

/// A job's schedule: a literal expression, a structured object, or anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleDescriptor {
    Expression(String),
    Structured(ScheduleSpec),
    Unknown(Value),
}

impl Default for ScheduleDescriptor {
    fn default() -> Self {
        ScheduleDescriptor::Unknown(Value::Null)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn describe_interval(every_ms: f64) -> Option<String> {
    if !every_ms.is_finite() || every_ms <= 0.0 {
        return None;
    }
    if every_ms < 60_000.0 {
        Some(format!("every {}s", (every_ms / 1000.0).round().max(1.0)))
    } else {
        Some(format!("every {} min", (every_ms / 60_000.0).round()))
    }
}

impl ScheduleSpec {
    /// `expr` wins; otherwise a kinded schedule is described by its interval,
    /// its `at` time, or its kind. Without `expr` or `kind` the fallback applies.
    pub fn display(&self) -> String {
        if let Some(expr) = non_empty(self.expr.as_deref()) {
            return expr.to_string();
        }
        let Some(kind) = non_empty(self.kind.as_deref()) else {
            return UNKNOWN_SCHEDULE.to_string();
        };
        if let Some(interval) = self.every_ms.and_then(describe_interval) {
            return interval;
        }
        if let Some(at) = non_empty(self.at.as_deref()) {
            return format!("at {}", at);
        }
        kind.to_string()
    }
}

impl ScheduleDescriptor {
    /// Always returns a displayable string, even for malformed descriptors.
    pub fn display(&self) -> String {
        match self {
            ScheduleDescriptor::Expression(expr) => non_empty(Some(expr))
                .unwrap_or(UNKNOWN_SCHEDULE)
                .to_string(),
            ScheduleDescriptor::Structured(spec) => spec.display(),
            ScheduleDescriptor::Unknown(value) => display_loose(value),
        }
    }
}

/// Fields with unexpected types (e.g. a numeric `expr`) end up here.
fn display_loose(value: &Value) -> String {
    let Value::Object(map) = value else {
        return UNKNOWN_SCHEDULE.to_string();
    };
    let field = |name: &str| -> Option<String> {
        match map.get(name)? {
            Value::String(s) => non_empty(Some(s)).map(str::to_string),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };
    field("expr")
        .or_else(|| field("kind"))
        .unwrap_or_else(|| UNKNOWN_SCHEDULE.to_string())
}

/// Accepts a string or a number (epoch millis) and keeps it as text.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn default_enabled() -> bool {
    true
}

/// A job scheduled on the gateway, as reported by `cron list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub schedule: ScheduleDescriptor,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_run: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Map<String, Value>>,
}

impl ScheduledJob {
    pub fn schedule_display(&self) -> String {
        self.schedule.display()
    }
}

/// The `cron list` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobsResponse {
    pub jobs: Vec<ScheduledJob>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(value: Value) -> ScheduleDescriptor {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_structured_expr_normalizes_to_expression() {
        assert_eq!(descriptor(json!({ "expr": "0 6 * * *" })).display(), "0 6 * * *");
        assert_eq!(
            descriptor(json!({ "kind": "cron", "expr": "*/5 * * * *", "tz": "UTC" })).display(),
            "*/5 * * * *"
        );
    }

    #[test]
    fn test_without_expr_or_kind_uses_fallback() {
        assert_eq!(descriptor(json!({})).display(), UNKNOWN_SCHEDULE);
        assert_eq!(descriptor(json!({ "tz": "Europe/Copenhagen" })).display(), UNKNOWN_SCHEDULE);
        assert_eq!(descriptor(json!(null)).display(), UNKNOWN_SCHEDULE);
        assert_eq!(descriptor(json!("")).display(), UNKNOWN_SCHEDULE);
        assert_eq!(descriptor(json!([1, 2])).display(), UNKNOWN_SCHEDULE);
        assert_eq!(ScheduleDescriptor::default().display(), UNKNOWN_SCHEDULE);
    }

    #[test]
    fn test_kinded_schedules() {
        assert_eq!(
            descriptor(json!({ "kind": "every", "everyMs": 300000 })).display(),
            "every 5 min"
        );
        assert_eq!(
            descriptor(json!({ "kind": "every", "everyMs": 15000 })).display(),
            "every 15s"
        );
        assert_eq!(
            descriptor(json!({ "kind": "at", "at": "2026-01-01T08:00:00Z" })).display(),
            "at 2026-01-01T08:00:00Z"
        );
        assert_eq!(descriptor(json!({ "kind": "manual" })).display(), "manual");
    }

    #[test]
    fn test_malformed_fields_still_display() {
        let odd = descriptor(json!({ "expr": 5 }));
        assert!(matches!(odd, ScheduleDescriptor::Unknown(_)));
        assert_eq!(odd.display(), "5");
    }

    #[test]
    fn test_job_accepts_numeric_run_times() {
        let job: ScheduledJob = serde_json::from_value(json!({
            "id": "daily",
            "name": "Morning brief",
            "schedule": "0 6 * * *",
            "lastRun": 1_700_000_000_000i64,
            "nextRun": "2026-10-20T06:00:00Z"
        }))
        .unwrap();

        assert!(job.enabled);
        assert_eq!(job.schedule_display(), "0 6 * * *");
        assert_eq!(job.last_run.as_deref(), Some("1700000000000"));
        assert_eq!(job.next_run.as_deref(), Some("2026-10-20T06:00:00Z"));
    }
}
