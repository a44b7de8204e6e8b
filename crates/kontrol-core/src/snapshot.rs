//! The aggregate view of the gateway published to observers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use strum::Display;

use crate::cron::ScheduledJob;
use crate::session::GatewaySession;

/// One independently fetched data category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Domain {
    Sessions,
    Status,
    Jobs,
    Config,
}

/// Observable connection state of the sync loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkState {
    /// No tick has completed yet.
    #[default]
    Uninitialized,
    /// At least one domain succeeded on the latest tick.
    Connected,
    /// Every domain failed on the latest tick.
    Disconnected,
    /// No auth token is configured; nothing was attempted.
    Unconfigured,
}

/// Immutable snapshot of the mirrored gateway state.
///
/// Each domain sits behind its own `Arc`. A publish that leaves a domain
/// unchanged carries the previous `Arc` forward, so observers can skip work
/// with [`Arc::ptr_eq`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub sessions: Arc<Vec<GatewaySession>>,
    pub jobs: Arc<Vec<ScheduledJob>>,
    pub status: Option<Arc<str>>,
    pub config: Option<Arc<Value>>,
    pub link: LinkState,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn connected(&self) -> bool {
        self.link == LinkState::Connected
    }

    /// Domains whose value differs by identity between `previous` and `self`.
    pub fn changed_domains(&self, previous: &Snapshot) -> Vec<Domain> {
        let mut changed = Vec::new();
        if !Arc::ptr_eq(&self.sessions, &previous.sessions) {
            changed.push(Domain::Sessions);
        }
        if !same_option(&self.status, &previous.status) {
            changed.push(Domain::Status);
        }
        if !Arc::ptr_eq(&self.jobs, &previous.jobs) {
            changed.push(Domain::Jobs);
        }
        if !same_option(&self.config, &previous.config) {
            changed.push(Domain::Config);
        }
        changed
    }
}

fn same_option<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
