//! Domain layer for Kontrol.
//!
//! Holds the gateway data model, the invocation seam and its error taxonomy,
//! envelope unwrapping, fingerprinting and connection settings. No I/O lives here.

pub mod agent;
pub mod cron;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod session;
pub mod settings;
pub mod snapshot;

// Re-export common error types
pub use error::KontrolError;
pub use gateway::InvocationError;
