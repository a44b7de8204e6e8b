//! File-backed gateway settings.
//!
//! Settings live in `gateway.toml` under the kontrol config directory. Each
//! field absent from the file falls back to its environment variable.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use kontrol_core::error::Result;
use kontrol_core::settings::{GatewaySettings, SettingsEventBus, SettingsSource};
use kontrol_core::KontrolError;

use crate::paths::KontrolPaths;
use crate::storage::AtomicTomlFile;

pub const ENV_GATEWAY_URL: &str = "KONTROL_GATEWAY_URL";
pub const ENV_GATEWAY_TOKEN: &str = "KONTROL_GATEWAY_TOKEN";

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Persistent [`SettingsSource`] backed by an atomic TOML file.
///
/// Saving through the store publishes [`SettingsEvent::Changed`] on the
/// attached bus, so running sync loops pick up the new settings.
///
/// [`SettingsEvent::Changed`]: kontrol_core::settings::SettingsEvent::Changed
#[derive(Clone)]
pub struct FileSettingsStore {
    file: AtomicTomlFile<GatewaySettings>,
    bus: Option<SettingsEventBus>,
    env: EnvLookup,
}

impl FileSettingsStore {
    /// Opens the store at the default location.
    pub fn open_default() -> Result<Self> {
        let path = KontrolPaths::settings_file().map_err(|e| KontrolError::config(e.to_string()))?;
        Ok(Self::new(path))
    }

    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path).private(),
            bus: None,
            env: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    pub fn with_event_bus(mut self, bus: SettingsEventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Replaces the environment lookup used for fallback values.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    pub fn path(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }

    /// Settings stored in the file alone, without environment fallback.
    pub fn load_file(&self) -> Result<GatewaySettings> {
        Ok(self
            .file
            .load()?
            .map(GatewaySettings::normalized)
            .unwrap_or_default())
    }

    fn load_env(&self) -> GatewaySettings {
        GatewaySettings::new((self.env)(ENV_GATEWAY_URL), (self.env)(ENV_GATEWAY_TOKEN))
    }

    /// Writes `settings` to the file and notifies subscribers.
    pub fn save(&self, settings: &GatewaySettings) -> Result<()> {
        self.file.replace(&settings.clone().normalized())?;
        tracing::info!(
            "[FileSettingsStore] Saved gateway settings to {}",
            self.file.path().display()
        );
        self.notify();
        Ok(())
    }

    /// Changes only the fields that are `Some`. Blank strings clear a field.
    pub fn update(&self, gateway_url: Option<String>, auth_token: Option<String>) -> Result<GatewaySettings> {
        let written = self.file.update(GatewaySettings::default(), |current| {
            if let Some(url) = gateway_url {
                current.gateway_url = Some(url);
            }
            if let Some(token) = auth_token {
                current.auth_token = Some(token);
            }
            *current = current.clone().normalized();
        })?;
        tracing::info!("[FileSettingsStore] Updated gateway settings");
        self.notify();
        Ok(written)
    }

    /// Removes the settings file.
    pub fn clear(&self) -> Result<()> {
        self.file.remove()?;
        tracing::info!("[FileSettingsStore] Cleared gateway settings");
        self.notify();
        Ok(())
    }

    fn notify(&self) {
        if let Some(bus) = &self.bus {
            bus.notify_changed();
        }
    }
}

#[async_trait]
impl SettingsSource for FileSettingsStore {
    async fn load_settings(&self) -> Result<GatewaySettings> {
        let stored = self.load_file()?;
        Ok(stored.or(self.load_env()))
    }
}
