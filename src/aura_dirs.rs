//! Centralized application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/aura/` | `~/.config/aura/` |
//! | App data | `~/Library/Application Support/aura/` | `~/.local/share/aura/` |
//!
//! # Environment Overrides
//!
//! - `AURA_CONFIG_DIR` overrides [`config_dir`]
//! - `AURA_DATA_DIR` overrides [`data_dir`]

use std::path::PathBuf;

/// Application config directory (holds `config.json`).
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("AURA_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("aura"))
        .unwrap_or_else(|| PathBuf::from("/tmp/aura-config"))
}

/// Application data root directory (logs).
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("AURA_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("aura"))
        .unwrap_or_else(|| PathBuf::from("/tmp/aura-data"))
}

/// Main config file path (`config_dir()/config.json`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.json")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}
