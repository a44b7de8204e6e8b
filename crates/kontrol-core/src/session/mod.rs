//! Gateway sessions.

mod model;
mod reconcile;

pub use model::{GatewaySession, SessionKind, SessionMessage, SessionsResponse, ToolCall};
pub use reconcile::{Reconciled, reconcile_sessions};
