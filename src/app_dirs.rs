//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/fgcanvas/` | `~/.local/share/fgcanvas/` |
//! | Config | `~/Library/Application Support/fgcanvas/` | `~/.config/fgcanvas/` |
//! | Cache | `~/Library/Caches/fgcanvas/` | `~/.cache/fgcanvas/` |
//!
//! # Environment Overrides
//!
//! - `FGCANVAS_DATA_DIR` overrides [`data_dir`]
//! - `FGCANVAS_CONFIG_DIR` overrides [`config_dir`]
//! - `FGCANVAS_CACHE_DIR` overrides [`cache_dir`]

use std::path::PathBuf;

const APP_NAME: &str = "fgcanvas";

/// Application data root directory.
///
/// Holds saved layouts and logs. Resolves to `dirs::data_dir()/fgcanvas/` by
/// default.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("FGCANVAS_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("/tmp/fgcanvas-data"))
}

/// Application config directory (`config.toml`).
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("FGCANVAS_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("/tmp/fgcanvas-config"))
}

/// Application cache directory.
#[must_use]
pub fn cache_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("FGCANVAS_CACHE_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::cache_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("/tmp/fgcanvas-cache"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Saved layout directory (`data_dir()/layouts/`).
#[must_use]
pub fn layouts_dir() -> PathBuf {
    data_dir().join("layouts")
}

/// Default SVG snapshot directory (`cache_dir()/snapshots/`).
#[must_use]
pub fn snapshots_dir() -> PathBuf {
    cache_dir().join("snapshots")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
