//! Content fingerprints over the display-relevant fields of each domain.
//!
//! A fingerprint is the SHA-256 of a canonical JSON rendering (object keys
//! sorted at every level) of a whitelisted projection. Equal logical data always
//! yields equal fingerprints, whatever order the gateway emitted keys in.

use std::fmt;

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::cron::ScheduledJob;
use crate::session::GatewaySession;

/// Session fields compared by default.
pub const DEFAULT_SESSION_FIELDS: [&str; 4] = ["key", "updatedAt", "contextTokens", "totalTokens"];

/// Hex digest identifying a domain's display-relevant content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of_value(value: &Value) -> Self {
        Self::of_bytes(canonical_json(value).as_bytes())
    }

    pub fn of_text(text: &str) -> Self {
        Self::of_bytes(text.as_bytes())
    }

    fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        let mut output = String::with_capacity(digest.len() * 2);
        for byte in digest {
            output.push_str(&format!("{byte:02x}"));
        }
        Self(output)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// Serializes `value` with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Which session fields participate in the sessions fingerprint.
///
/// Field names are the gateway's camelCase names, so fields the dashboard does
/// not model (kept in `GatewaySession::extra`) can be added too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFingerprintFields {
    fields: Vec<String>,
}

impl Default for SessionFingerprintFields {
    fn default() -> Self {
        Self {
            fields: DEFAULT_SESSION_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl SessionFingerprintFields {
    /// Adds a field on top of the current set. Duplicates are ignored.
    pub fn with_extra(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn project(&self, session: &GatewaySession) -> Value {
        let full = serde_json::to_value(session).unwrap_or(Value::Null);
        let mut projected = Map::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = full.get(field).cloned().unwrap_or(Value::Null);
            projected.insert(field.clone(), value);
        }
        Value::Object(projected)
    }
}

/// Fingerprint of the session list. List order is significant.
pub fn sessions_fingerprint(
    sessions: &[GatewaySession],
    fields: &SessionFingerprintFields,
) -> Fingerprint {
    let projected: Vec<Value> = sessions.iter().map(|s| fields.project(s)).collect();
    Fingerprint::of_value(&Value::Array(projected))
}

/// Fingerprint of the job list over id, name, displayed schedule, enabled flag and run times.
pub fn jobs_fingerprint(jobs: &[ScheduledJob]) -> Fingerprint {
    let projected: Vec<Value> = jobs
        .iter()
        .map(|job| {
            json!({
                "id": job.id,
                "name": job.name,
                "schedule": job.schedule_display(),
                "enabled": job.enabled,
                "lastRun": job.last_run,
                "nextRun": job.next_run,
            })
        })
        .collect();
    Fingerprint::of_value(&Value::Array(projected))
}

pub fn status_fingerprint(status: &str) -> Fingerprint {
    Fingerprint::of_text(status)
}

/// The config has no fixed schema, so the whole object participates.
pub fn config_fingerprint(config: &Value) -> Fingerprint {
    Fingerprint::of_value(config)
}
