//! Viewer settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level viewer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Simulator to connect to.
    pub connection: ConnectionConfig,
    /// Output settings.
    pub display: DisplayConfig,
}

/// Simulator address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Host name of the simulator's HTTP server.
    pub host: String,
    /// HTTP/WebSocket port.
    pub port: u16,
    /// Path put in front of the mirrored root in the WebSocket URL
    /// (FlightGear serves the mirror under `/PropertyTreeMirror`).
    pub mirror_prefix: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 8080,
            mirror_prefix: String::new(),
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    /// Where daemon mode writes SVG snapshots (None = `app_dirs::snapshots_dir()`).
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            snapshot_dir: None,
        }
    }
}

impl DisplayConfig {
    /// Effective snapshot directory.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir
            .clone()
            .unwrap_or_else(crate::app_dirs::snapshots_dir)
    }
}

impl ViewerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::CanvasError::Config(e.to_string()))
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::CanvasError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `app_dirs::config_dir()/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ViewerConfig::default();
        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.connection.port, 8080);
        assert!(config.connection.mirror_prefix.is_empty());
        assert_eq!(config.display.width, 1024);
        assert_eq!(config.display.height, 768);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: ViewerConfig = toml::from_str(
            r#"
            [connection]
            host = "fg.local"
            "#,
        )
        .unwrap();
        assert_eq!(config.connection.host, "fg.local");
        assert_eq!(config.connection.port, 8080);
        assert_eq!(config.display, DisplayConfig::default());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = ViewerConfig::default();
        config.connection.port = 5400;
        config.connection.mirror_prefix = "/PropertyTreeMirror".into();
        config.display.snapshot_dir = Some(dir.path().join("svg"));

        config.save_to_file(&path).unwrap();
        let loaded = ViewerConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.display.snapshot_dir(), dir.path().join("svg"));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "connection = 5").unwrap();
        assert!(matches!(
            ViewerConfig::from_file(&path),
            Err(crate::error::CanvasError::Config(_))
        ));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ViewerConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }
}
