//! Monotonic merge of freshly fetched sessions into the held list.

use std::collections::HashMap;

use super::model::GatewaySession;

/// Result of [`reconcile_sessions`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub sessions: Vec<GatewaySession>,
    /// Keys whose fetched `updated_at` was older than the held one.
    pub regressed: Vec<String>,
    /// Duplicate keys collapsed within the fetched list.
    pub duplicates: usize,
}

/// Merges `fetched` over `held`.
///
/// Membership and order follow `fetched`. A key repeated within `fetched`
/// keeps its newest entry at the position of its first occurrence. A fetched
/// entry older than the held entry for the same key is replaced by the held one.
pub fn reconcile_sessions(held: &[GatewaySession], fetched: Vec<GatewaySession>) -> Reconciled {
    let held_by_key: HashMap<&str, &GatewaySession> =
        held.iter().map(|s| (s.key.as_str(), s)).collect();

    let mut position: HashMap<String, usize> = HashMap::with_capacity(fetched.len());
    let mut sessions: Vec<GatewaySession> = Vec::with_capacity(fetched.len());
    let mut duplicates = 0;

    for session in fetched {
        match position.get(&session.key) {
            Some(&index) => {
                duplicates += 1;
                if session.updated_at > sessions[index].updated_at {
                    sessions[index] = session;
                }
            }
            None => {
                position.insert(session.key.clone(), sessions.len());
                sessions.push(session);
            }
        }
    }

    let mut regressed = Vec::new();
    for session in sessions.iter_mut() {
        if let Some(current) = held_by_key.get(session.key.as_str())
            && session.updated_at < current.updated_at
        {
            regressed.push(session.key.clone());
            *session = (*current).clone();
        }
    }

    Reconciled {
        sessions,
        regressed,
        duplicates,
    }
}
