//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | Linux default | Override |
//! |---------|---------------|----------|
//! | Data (database, logs) | `~/.local/share/chorewheel/` | `CHOREWHEEL_DATA_DIR` |
//! | Config | `~/.config/chorewheel/` | `CHOREWHEEL_CONFIG_DIR` |

use std::path::PathBuf;

const APP_DIR: &str = "chorewheel";

/// Application data root. Holds the SQLite database and log files.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CHOREWHEEL_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/chorewheel-data"))
}

/// Application config directory.
///
/// Honors `XDG_CONFIG_HOME` through [`dirs::config_dir`].
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CHOREWHEEL_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp/chorewheel-config"))
}

/// Default database file (`data_dir()/chorewheel.db`).
#[must_use]
pub fn database_file() -> PathBuf {
    data_dir().join("chorewheel.db")
}

/// Default log directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}
