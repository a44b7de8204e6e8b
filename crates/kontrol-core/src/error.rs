//! Error types for the Kontrol application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::InvocationError;

/// A shared error type for the non-transport parts of Kontrol.
///
/// Gateway calls report [`InvocationError`] instead; it converts into
/// [`KontrolError::Gateway`] when it crosses into configuration or storage code.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum KontrolError {
    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error (bad gateway address, unreadable settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error (lock contention, missing directories)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A gateway call failed
    #[error("Gateway error: {0}")]
    Gateway(InvocationError),
}

impl KontrolError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Returns the wrapped gateway error, if any.
    pub fn as_gateway(&self) -> Option<&InvocationError> {
        match self {
            Self::Gateway(err) => Some(err),
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for KontrolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for KontrolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for KontrolError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for KontrolError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for KontrolError {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid gateway address: {}", err))
    }
}

impl From<InvocationError> for KontrolError {
    fn from(err: InvocationError) -> Self {
        Self::Gateway(err)
    }
}

/// A type alias for `Result<T, KontrolError>`.
pub type Result<T> = std::result::Result<T, KontrolError>;
