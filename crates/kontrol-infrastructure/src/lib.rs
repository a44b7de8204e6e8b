pub mod paths;
pub mod settings_store;
pub mod settings_watcher;
pub mod storage;

pub use crate::paths::{KontrolPaths, PathError};
pub use crate::settings_store::FileSettingsStore;
pub use crate::settings_watcher::SettingsFileWatcher;
