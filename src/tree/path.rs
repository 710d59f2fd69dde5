//! Slash-separated property paths with optional `[n]` indices.
//!
//! `"a/b[2]/c"` is three segments: `(a, 0)`, `(b, 2)`, `(c, 0)`.

use std::fmt;

use crate::error::{CanvasError, Result};

/// A single `(name, index)` path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameIndex {
    pub name: String,
    pub index: u32,
}

impl NameIndex {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// Parse one segment such as `size` or `size[1]`.
    pub fn parse(segment: &str) -> Result<Self> {
        if segment.is_empty() {
            return Err(CanvasError::MalformedPath("empty path segment".into()));
        }

        let Some(open) = segment.find('[') else {
            return Ok(Self::new(segment, 0));
        };

        let name = &segment[..open];
        let rest = &segment[open + 1..];
        let index = rest
            .strip_suffix(']')
            .and_then(|digits| digits.parse::<u32>().ok());

        match index {
            Some(index) if !name.is_empty() => Ok(Self::new(name, index)),
            _ => Err(CanvasError::MalformedPath(format!(
                "bad index syntax in segment {segment:?}"
            ))),
        }
    }
}

impl fmt::Display for NameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.index)
        }
    }
}

/// Split a relative path into segments. The empty path has no segments.
pub fn parse_path(path: &str) -> Result<Vec<NameIndex>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    path.split('/')
        .map(|segment| {
            NameIndex::parse(segment).map_err(|_| {
                CanvasError::MalformedPath(format!("{path:?}: bad segment {segment:?}"))
            })
        })
        .collect()
}

/// Normalize a mirrored root path: leading `/`, no trailing `/`.
pub fn normalize_root_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

/// Map a remote absolute path onto a path relative to `root`.
///
/// Returns `None` when `remote` is not `root` itself or below it. Matching is on a
/// component boundary, so `/canvasX` is not under `/canvas`.
pub fn strip_root<'a>(root: &str, remote: &'a str) -> Option<&'a str> {
    let rest = remote.strip_prefix(root)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}
