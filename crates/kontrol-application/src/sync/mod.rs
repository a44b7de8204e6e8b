//! Live mirror of gateway state.

mod aggregator;
mod config;
mod failures;
mod report;

pub use aggregator::SyncAggregator;
pub use config::{
    DEFAULT_PERSISTENT_FAILURE_THRESHOLD, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL, SyncConfig,
};
pub use report::TickReport;
