//! Picks up settings edits made by other processes.
//!
//! [`FileSettingsStore`](crate::FileSettingsStore) publishes on its own bus when it
//! writes, but `kontrol settings set` runs in a separate process from
//! `kontrol watch`. This watcher observes the settings file's directory and
//! republishes edits on the local bus after a short quiet period.

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::time::Duration;

use kontrol_core::KontrolError;
use kontrol_core::error::Result;
use kontrol_core::settings::SettingsEventBus;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One save produces several filesystem events; they collapse into one notification.
const SETTINGS_DEBOUNCE: Duration = Duration::from_millis(250);

/// Publishes [`SettingsEvent::Changed`] whenever the settings file changes on disk.
///
/// Stops when dropped.
///
/// [`SettingsEvent::Changed`]: kontrol_core::settings::SettingsEvent::Changed
pub struct SettingsFileWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl SettingsFileWatcher {
    /// Starts watching `path`. Must be called inside a tokio runtime.
    ///
    /// The parent directory is created if missing, since the file itself may not
    /// exist yet and atomic saves replace it by rename.
    pub fn spawn(path: &Path, bus: SettingsEventBus) -> Result<Self> {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or_else(|| KontrolError::config(format!("{} has no parent directory", path.display())))?;
        let file_name = path
            .file_name()
            .map(OsStr::to_os_string)
            .ok_or_else(|| KontrolError::config(format!("{} has no file name", path.display())))?;
        std::fs::create_dir_all(dir)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if touches(&event, &file_name) => {
                let _ = tx.send(());
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("[SettingsFileWatcher] Watch error: {}", e),
        })
        .map_err(|e| KontrolError::io(format!("cannot start settings watcher: {}", e)))?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| KontrolError::io(format!("cannot watch {}: {}", dir.display(), e)))?;

        tracing::debug!("[SettingsFileWatcher] Watching {}", path.display());
        let task = tokio::spawn(forward_changes(rx, bus));
        Ok(Self {
            _watcher: watcher,
            task,
        })
    }
}

impl Drop for SettingsFileWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    !event.kind.is_access()
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name.as_os_str()))
}

async fn forward_changes(mut rx: mpsc::UnboundedReceiver<()>, bus: SettingsEventBus) {
    let mut pending = false;
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(()) => pending = true,
                None => break,
            },
            _ = tokio::time::sleep(SETTINGS_DEBOUNCE), if pending => {
                pending = false;
                tracing::info!("[SettingsFileWatcher] Settings file changed on disk");
                bus.notify_changed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileSettingsStore;
    use kontrol_core::settings::{GatewaySettings, SettingsEvent};
    use notify::EventKind;
    use notify::event::{AccessKind, CreateKind};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_touches_only_the_settings_file() {
        let name = OsString::from("gateway.toml");
        let event = |kind, path: &str| Event::new(kind).add_path(PathBuf::from(path));

        assert!(touches(
            &event(EventKind::Create(CreateKind::File), "/cfg/kontrol/gateway.toml"),
            &name
        ));
        assert!(!touches(
            &event(EventKind::Create(CreateKind::File), "/cfg/kontrol/gateway.lock"),
            &name
        ));
        assert!(!touches(
            &event(EventKind::Access(AccessKind::Any), "/cfg/kontrol/gateway.toml"),
            &name
        ));
    }

    #[tokio::test]
    async fn test_write_from_another_store_is_published() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kontrol").join("gateway.toml");
        let bus = SettingsEventBus::new();
        let mut events = bus.subscribe();
        let _watcher = SettingsFileWatcher::spawn(&path, bus).unwrap();

        // A store without a bus stands in for a separate process.
        FileSettingsStore::new(path)
            .with_env_lookup(|_| None)
            .save(&GatewaySettings::new(None, Some("token".into())))
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("settings change within timeout")
            .unwrap();
        assert_eq!(event, SettingsEvent::Changed);
    }
}
