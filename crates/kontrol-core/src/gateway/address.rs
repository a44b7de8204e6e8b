//! Gateway base-address resolution.

use url::Url;

use crate::error::{KontrolError, Result};

/// Gateway address used when none is configured and nothing forces a proxy.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:63362";

/// Same-origin path the hosting environment forwards to the gateway.
pub const DEFAULT_PROXY_PATH: &str = "/api/gateway";

/// Path of the tool invocation endpoint, relative to the base address.
pub const INVOKE_PATH: &str = "tools/invoke";

/// Where the client is running, as far as cross-origin policy is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HostEnvironment {
    /// No cross-origin restriction; the configured address is used directly.
    #[default]
    Native,
    /// Served from `origin`, which only permits same-origin requests. Cross-origin
    /// gateways are reached through `proxy_path` on the same origin.
    Hosted { origin: Url, proxy_path: String },
}

impl HostEnvironment {
    /// A hosted environment using the default proxy path.
    pub fn hosted(origin: &str) -> Result<Self> {
        let origin = Url::parse(origin)?;
        Ok(Self::Hosted {
            origin,
            proxy_path: DEFAULT_PROXY_PATH.to_string(),
        })
    }

    /// Overrides the proxy path. No-op for [`HostEnvironment::Native`].
    pub fn with_proxy_path(self, path: impl Into<String>) -> Self {
        match self {
            Self::Hosted { origin, .. } => Self::Hosted {
                origin,
                proxy_path: path.into(),
            },
            native => native,
        }
    }

    fn proxy_url(origin: &Url, proxy_path: &str) -> Result<Url> {
        Ok(origin.join(proxy_path)?)
    }
}

/// Resolves the base address for gateway calls.
///
/// Pure function of the configured address and the host environment:
/// - nothing configured: [`DEFAULT_GATEWAY_URL`] natively, the proxy path when hosted
/// - hosted and the address is on another origin: the proxy path on the hosting origin
/// - hosted and the address is relative: joined onto the hosting origin
/// - otherwise: the configured address
pub fn resolve_base_url(configured: Option<&str>, host: &HostEnvironment) -> Result<Url> {
    let configured = configured
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty());

    let Some(address) = configured else {
        return match host {
            HostEnvironment::Native => Ok(Url::parse(DEFAULT_GATEWAY_URL)?),
            HostEnvironment::Hosted { origin, proxy_path } => {
                HostEnvironment::proxy_url(origin, proxy_path)
            }
        };
    };

    match (Url::parse(address), host) {
        (Ok(url), _) if !matches!(url.scheme(), "http" | "https") => Err(KontrolError::config(
            format!("unsupported gateway scheme '{}'", url.scheme()),
        )),
        (Ok(url), HostEnvironment::Hosted { origin, proxy_path })
            if url.origin() != origin.origin() =>
        {
            HostEnvironment::proxy_url(origin, proxy_path)
        }
        (Ok(url), _) => Ok(url),
        (Err(url::ParseError::RelativeUrlWithoutBase), HostEnvironment::Hosted { origin, .. }) => {
            Ok(origin.join(address)?)
        }
        (Err(err), _) => Err(err.into()),
    }
}

/// The full invocation endpoint for a resolved base address.
pub fn invoke_endpoint(base: &Url) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), INVOKE_PATH)
}
