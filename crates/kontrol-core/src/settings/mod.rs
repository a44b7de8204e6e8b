//! Gateway connection settings and their source.

mod event;

use serde::{Deserialize, Serialize};

pub use event::{SettingsEvent, SettingsEventBus};

/// Connection settings for the gateway.
///
/// Either field may be absent; an absent token means "not configured" rather
/// than an error. Blank strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl GatewaySettings {
    pub fn new(gateway_url: Option<String>, auth_token: Option<String>) -> Self {
        Self {
            gateway_url,
            auth_token,
        }
        .normalized()
    }

    /// Trims both fields and drops blank ones.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            gateway_url: clean(self.gateway_url),
            auth_token: clean(self.auth_token),
        }
    }

    /// The token, if one is configured and non-blank.
    pub fn token(&self) -> Option<&str> {
        self.auth_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn has_credential(&self) -> bool {
        self.token().is_some()
    }

    /// Fills absent fields from `fallback`.
    pub fn or(self, fallback: GatewaySettings) -> Self {
        let this = self.normalized();
        let fallback = fallback.normalized();
        Self {
            gateway_url: this.gateway_url.or(fallback.gateway_url),
            auth_token: this.auth_token.or(fallback.auth_token),
        }
    }
}

/// Supplies the current gateway settings.
///
/// # Security Note
///
/// Implementations must never log or embed the token in error messages.
#[async_trait::async_trait]
pub trait SettingsSource: Send + Sync {
    /// Loads the current settings. Missing settings are `Ok` with absent fields.
    async fn load_settings(&self) -> crate::error::Result<GatewaySettings>;
}

/// A fixed set of settings, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub GatewaySettings);

#[async_trait::async_trait]
impl SettingsSource for StaticSettings {
    async fn load_settings(&self) -> crate::error::Result<GatewaySettings> {
        Ok(self.0.clone())
    }
}
