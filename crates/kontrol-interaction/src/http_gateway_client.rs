//! reqwest-backed [`GatewayInvoker`].
//!
//! Sends `POST {base}/tools/invoke` with a bearer token and a JSON body
//! `{ "tool": <operation>, "args": <arguments> }`, then checks the envelope.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kontrol_core::gateway::{
    GatewayInvoker, HostEnvironment, InvocationError, InvokerFactory, RpcEnvelope,
    invoke_endpoint, resolve_base_url,
};
use kontrol_core::settings::GatewaySettings;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("kontrol/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body kept in [`InvocationError::Http`].
const MAX_ERROR_BODY: usize = 512;

/// Transport tuning for [`HttpGatewayClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Per-request timeout. `None` leaves requests bounded only by the OS.
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientOptions {
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

#[derive(Serialize)]
struct InvokeRequest<'a> {
    tool: &'a str,
    args: &'a Value,
}

/// Gateway client bound to one endpoint and one credential.
///
/// Build a new client when the settings change; a client never re-reads them.
#[derive(Clone)]
pub struct HttpGatewayClient {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
    options: ClientOptions,
}

impl std::fmt::Debug for HttpGatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGatewayClient")
            .field("endpoint", &self.endpoint)
            .field("has_token", &self.auth_token.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl HttpGatewayClient {
    pub fn new(base_url: &Url, auth_token: Option<String>, options: ClientOptions) -> Self {
        Self {
            client: Client::new(),
            endpoint: invoke_endpoint(base_url),
            auth_token: auth_token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            options,
        }
    }

    /// Resolves the address for `host` and binds the settings' token.
    pub fn from_settings(
        settings: &GatewaySettings,
        host: &HostEnvironment,
        options: ClientOptions,
    ) -> kontrol_core::error::Result<Self> {
        let base = resolve_base_url(settings.gateway_url.as_deref(), host)?;
        Ok(Self::new(
            &base,
            settings.token().map(str::to_string),
            options,
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn auth_request(&self, request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        let request = request
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, &self.options.user_agent);
        match self.options.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }
}

fn truncate_body(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[async_trait]
impl GatewayInvoker for HttpGatewayClient {
    async fn invoke(&self, operation: &str, args: Value) -> Result<RpcEnvelope, InvocationError> {
        let Some(token) = self.auth_token.as_deref() else {
            return Err(InvocationError::Unauthenticated);
        };

        tracing::debug!("[HttpGatewayClient] Invoking '{}' at {}", operation, self.endpoint);

        let request = self
            .client
            .post(&self.endpoint)
            .json(&InvokeRequest {
                tool: operation,
                args: &args,
            });
        let response = self
            .auth_request(request, token)
            .send()
            .await
            .map_err(|e| InvocationError::network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InvocationError::network(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            tracing::debug!(
                "[HttpGatewayClient] '{}' returned HTTP {}",
                operation,
                status.as_u16()
            );
            return Err(InvocationError::http(status.as_u16(), truncate_body(body)));
        }

        let envelope: RpcEnvelope = serde_json::from_str(&body).map_err(|e| {
            InvocationError::protocol(format!("response is not a gateway envelope: {}", e))
        })?;

        envelope.into_checked()
    }
}

/// Stands in for a client when the configured address cannot be resolved.
struct UnresolvedAddress {
    message: String,
}

#[async_trait]
impl GatewayInvoker for UnresolvedAddress {
    async fn invoke(&self, _operation: &str, _args: Value) -> Result<RpcEnvelope, InvocationError> {
        Err(InvocationError::invalid_address(self.message.clone()))
    }
}

/// [`InvokerFactory`] producing [`HttpGatewayClient`]s for a fixed host environment.
#[derive(Debug, Clone, Default)]
pub struct HttpInvokerFactory {
    host: HostEnvironment,
    options: ClientOptions,
}

impl HttpInvokerFactory {
    pub fn new(host: HostEnvironment, options: ClientOptions) -> Self {
        Self { host, options }
    }
}

impl InvokerFactory for HttpInvokerFactory {
    fn connect(&self, settings: &GatewaySettings) -> Arc<dyn GatewayInvoker> {
        match HttpGatewayClient::from_settings(settings, &self.host, self.options.clone()) {
            Ok(client) => {
                tracing::info!("[HttpInvokerFactory] Gateway endpoint: {}", client.endpoint());
                Arc::new(client)
            }
            Err(e) => {
                tracing::warn!("[HttpInvokerFactory] Cannot resolve gateway address: {}", e);
                Arc::new(UnresolvedAddress {
                    message: e.to_string(),
                })
            }
        }
    }
}
