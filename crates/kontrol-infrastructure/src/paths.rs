//! Platform paths for Kontrol's files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/kontrol/           # Config directory (platform config dir + "kontrol")
//! ├── gateway.toml             # Gateway address and auth token (mode 600)
//! └── logs/                    # Rolling log files
//!     └── kontrol.log.YYYY-MM-DD
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "kontrol";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home/config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for kontrol.
pub struct KontrolPaths;

impl KontrolPaths {
    /// Returns the kontrol configuration directory (e.g. `~/.config/kontrol/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::ConfigDirNotFound)
    }

    /// Returns the path to the gateway settings file.
    ///
    /// # Security Note
    ///
    /// The file holds the gateway auth token and is written with mode 600 on Unix.
    pub fn settings_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("gateway.toml"))
    }

    /// Returns the path to the logs directory.
    pub fn logs_dir() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("logs"))
    }
}
