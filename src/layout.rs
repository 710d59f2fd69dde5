//! Saved layouts.
//!
//! A layout is a named JSON document listing the save blobs of every open canvas:
//!
//! ```json
//! {"configName": "cockpit", "canvases": [{"host": "localhost", "port": 8080, "rootPath": "/canvas/by-index/texture[0]"}]}
//! ```
//!
//! Layouts live as `*.json` files in one directory. Saving never overwrites.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canvas::connection::ConnectionState;
use crate::error::{CanvasError, Result};

/// A persisted set of canvases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLayout {
    #[serde(default)]
    pub config_name: String,
    #[serde(default)]
    pub canvases: Vec<ConnectionState>,
}

impl SavedLayout {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A layout file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    pub name: String,
    pub path: PathBuf,
}

/// File name stem for a layout name: whitespace, `-`, `"` and `/` become `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '-' | '"' | '/') {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Directory of saved layouts.
#[derive(Debug, Clone)]
pub struct LayoutStore {
    dir: PathBuf,
}

impl Default for LayoutStore {
    fn default() -> Self {
        Self::new(crate::app_dirs::layouts_dir())
    }
}

impl LayoutStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a layout with this name is saved to.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_name(name)))
    }

    /// Every readable layout, sorted by file name. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<LayoutEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read(&path)
                .map_err(CanvasError::from)
                .and_then(|bytes| SavedLayout::from_json(&bytes))
            {
                Ok(layout) => entries.push(LayoutEntry {
                    name: layout.config_name,
                    path,
                }),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable layout");
                }
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Write `layout` under its sanitized name.
    ///
    /// # Errors
    ///
    /// [`CanvasError::FileExists`] if a layout file with the same name exists.
    pub fn save(&self, layout: &SavedLayout) -> Result<PathBuf> {
        if layout.config_name.trim().is_empty() {
            return Err(CanvasError::Config("layout name is empty".into()));
        }
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path_for(&layout.config_name);
        if path.exists() {
            tracing::warn!(path = %path.display(), "not overwriting existing layout");
            return Err(CanvasError::FileExists(path));
        }
        std::fs::write(&path, layout.to_json()?)?;
        tracing::info!(name = %layout.config_name, path = %path.display(), "layout saved");
        Ok(path)
    }

    /// Read a layout file.
    pub fn load(&self, path: &Path) -> Result<SavedLayout> {
        let bytes = std::fs::read(path)?;
        SavedLayout::from_json(&bytes)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_name(r#"my "left"-panel/2 a"#), "my__left__panel_2_a");
        assert_eq!(sanitize_name("plain"), "plain");
    }

    #[test]
    fn layout_json_field_names() {
        let layout = SavedLayout {
            config_name: "c".into(),
            canvases: vec![ConnectionState {
                host: "h".into(),
                port: 1,
                root_path: "/r".into(),
                snapshot: None,
            }],
        };
        let json: serde_json::Value = serde_json::from_str(&layout.to_json().unwrap()).unwrap();
        assert_eq!(json["configName"], "c");
        assert_eq!(json["canvases"][0]["rootPath"], "/r");
    }

    #[test]
    fn missing_fields_default() {
        let layout = SavedLayout::from_json(b"{}").unwrap();
        assert!(layout.config_name.is_empty());
        assert!(layout.canvases.is_empty());
    }

    #[test]
    fn empty_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path());
        assert!(matches!(
            store.save(&SavedLayout::default()),
            Err(CanvasError::Config(_))
        ));
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
    }
}
