//! Application layer for Kontrol.
//!
//! [`GatewayApi`] turns raw tool calls into typed domain data, and
//! [`SyncAggregator`] keeps a deduplicated, change-minimal mirror of it.

pub mod gateway_api;
pub mod sync;

pub use gateway_api::{GatewayApi, SpawnedSession, parse_runtime_info};
pub use sync::{DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL, SyncAggregator, SyncConfig, TickReport};
