//! Failure taxonomy for gateway invocations.

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};
use thiserror::Error;

/// Message used when the gateway reports a failure without saying why.
pub const GENERIC_REMOTE_ERROR: &str = "gateway reported an error";

/// A failed gateway invocation.
///
/// Callers classify failures by variant, never by message. The sync loop treats
/// [`InvocationError::Unauthenticated`] and [`InvocationError::InvalidAddress`]
/// as "not configured" and everything else as transient.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationError {
    /// No auth credential is configured; no request was sent.
    #[error("no gateway auth token configured")]
    Unauthenticated,

    /// The configured gateway address cannot be turned into an endpoint; no request was sent.
    #[error("invalid gateway address: {message}")]
    InvalidAddress { message: String },

    /// The request never produced an HTTP response.
    #[error("network error: {message}")]
    Network { message: String },

    /// The gateway answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A success response whose body is not the expected envelope or payload shape.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// A well-formed envelope with `ok: false`.
    #[error("gateway error: {message}")]
    Remote { message: String },
}

/// Variant tag of an [`InvocationError`], for logging and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvocationErrorKind {
    Unauthenticated,
    InvalidAddress,
    Network,
    Http,
    Protocol,
    Remote,
}

impl InvocationErrorKind {
    /// Failures that only a settings change can fix.
    pub fn is_configuration(self) -> bool {
        matches!(self, Self::Unauthenticated | Self::InvalidAddress)
    }
}

impl InvocationError {
    pub fn invalid_address(message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a Remote error, substituting the generic message for a missing or blank one.
    pub fn remote(message: Option<String>) -> Self {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| GENERIC_REMOTE_ERROR.to_string());
        Self::Remote { message }
    }

    pub fn kind(&self) -> InvocationErrorKind {
        match self {
            Self::Unauthenticated => InvocationErrorKind::Unauthenticated,
            Self::InvalidAddress { .. } => InvocationErrorKind::InvalidAddress,
            Self::Network { .. } => InvocationErrorKind::Network,
            Self::Http { .. } => InvocationErrorKind::Http,
            Self::Protocol { .. } => InvocationErrorKind::Protocol,
            Self::Remote { .. } => InvocationErrorKind::Remote,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    pub fn is_configuration(&self) -> bool {
        self.kind().is_configuration()
    }

    /// Everything except a settings problem is worth retrying on the next tick.
    pub fn is_transient(&self) -> bool {
        !self.is_configuration()
    }
}
