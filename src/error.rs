//! Error types for the canvas mirror.

use std::path::PathBuf;

/// Top-level error type for the canvas viewer.
///
/// Entry-level protocol problems inside an update message are not errors; they are
/// reported as [`ProtocolWarning`](crate::canvas::session::ProtocolWarning)s and the
/// rest of the message is still applied.
#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    /// A property path contained an empty segment or an unparsable index.
    #[error("malformed property path: {0}")]
    MalformedPath(String),

    /// A node handle no longer refers to a live property node.
    #[error("stale property node handle")]
    StaleNode,

    /// An update message could not be interpreted at all.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Connection or HTTP failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Refused to overwrite an existing file.
    #[error("file already exists: {}", .0.display())]
    FileExists(PathBuf),

    /// Image fetch or decode error.
    #[error("image error: {0}")]
    Image(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, CanvasError>;
