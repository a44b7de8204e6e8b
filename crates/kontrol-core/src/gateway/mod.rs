//! Gateway invocation seam.
//!
//! The gateway exposes a single tool-call RPC. Everything that talks to it goes
//! through [`GatewayInvoker`], so the sync loop can be driven by the HTTP client
//! in production and by scripted invokers in tests.

mod address;
mod envelope;
mod error;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::settings::GatewaySettings;

pub use address::{
    DEFAULT_GATEWAY_URL, DEFAULT_PROXY_PATH, HostEnvironment, INVOKE_PATH, invoke_endpoint,
    resolve_base_url,
};
pub use envelope::{Payload, RpcEnvelope, find_payload, payload_candidates, unwrap_payload};
pub use error::{GENERIC_REMOTE_ERROR, InvocationError, InvocationErrorKind};

/// Invokes a named remote tool with an argument bag.
///
/// Implementations return the checked envelope (`ok: true`); every failure is
/// one of the [`InvocationError`] variants. No retries happen here.
#[async_trait]
pub trait GatewayInvoker: Send + Sync {
    async fn invoke(&self, operation: &str, args: Value) -> Result<RpcEnvelope, InvocationError>;
}

/// Builds an invoker for a given set of connection settings.
///
/// The sync loop calls this at start-up and again whenever the settings change,
/// so invokers never read credentials from shared state on their own.
pub trait InvokerFactory: Send + Sync {
    fn connect(&self, settings: &GatewaySettings) -> Arc<dyn GatewayInvoker>;
}

impl<F> InvokerFactory for F
where
    F: Fn(&GatewaySettings) -> Arc<dyn GatewayInvoker> + Send + Sync,
{
    fn connect(&self, settings: &GatewaySettings) -> Arc<dyn GatewayInvoker> {
        self(settings)
    }
}
