use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const EVENT_BUS_CAPACITY: usize = 16;

/// Process-wide notifications about the connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettingsEvent {
    /// The gateway address or token was edited.
    Changed,
}

/// Broadcast channel carrying [`SettingsEvent`]s.
///
/// Cloning the bus shares the channel. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct SettingsEventBus {
    sender: broadcast::Sender<SettingsEvent>,
}

impl SettingsEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event; returns the number of subscribers that will see it.
    pub fn publish(&self, event: SettingsEvent) -> usize {
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(
            "[SettingsEventBus] Published {:?} to {} subscriber(s)",
            event,
            delivered
        );
        delivered
    }

    pub fn notify_changed(&self) -> usize {
        self.publish(SettingsEvent::Changed)
    }
}

impl Default for SettingsEventBus {
    fn default() -> Self {
        Self::new()
    }
}
