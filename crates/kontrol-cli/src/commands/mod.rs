pub mod invoke;
pub mod render;
pub mod settings;
pub mod status;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use kontrol_application::{SyncAggregator, SyncConfig};
use kontrol_core::gateway::HostEnvironment;
use kontrol_core::settings::SettingsEventBus;
use kontrol_infrastructure::FileSettingsStore;
use kontrol_interaction::{ClientOptions, HttpInvokerFactory};

/// Wiring shared by every command.
pub struct Context {
    pub bus: SettingsEventBus,
    pub store: FileSettingsStore,
    pub factory: HttpInvokerFactory,
}

impl Context {
    pub fn new(request_timeout: Option<Duration>) -> Result<Self> {
        let bus = SettingsEventBus::new();
        let store = FileSettingsStore::open_default()?.with_event_bus(bus.clone());
        let options = ClientOptions {
            request_timeout,
            ..ClientOptions::default()
        };
        Ok(Self {
            bus,
            store,
            factory: HttpInvokerFactory::new(HostEnvironment::Native, options),
        })
    }

    pub async fn aggregator(&self, config: SyncConfig) -> Result<SyncAggregator> {
        Ok(SyncAggregator::new(
            Arc::new(self.store.clone()),
            Arc::new(self.factory.clone()),
            config,
        )
        .await?)
    }
}
