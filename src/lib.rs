//! fgcanvas: remote mirror viewer for FlightGear canvases.
//!
//! The simulator exposes each canvas as a subtree of its property tree. This crate
//! mirrors such a subtree over a WebSocket and renders it locally:
//! wire update -> [`canvas::MirrorSession`] -> [`tree::PropertyTree`] ->
//! [`scene::CanvasScene`] -> paint pass.
//!
//! # Architecture
//!
//! - **tree**: arena of named/indexed property nodes with synchronous observers
//! - **canvas**: wire protocol, mirror sessions, transports, discovery and images
//! - **scene**: element tree (group, path, text, image, map) with dirty flags
//! - **viewer**: composition root that owns every open connection

pub mod app_dirs;
pub mod canvas;
pub mod config;
pub mod error;
pub mod layout;
pub mod scene;
pub mod tree;
pub mod viewer;

pub use canvas::{CanvasConnection, ConnectionStatus, MirrorSession, QueryStatus};
pub use config::ViewerConfig;
pub use error::{CanvasError, Result};
pub use layout::{LayoutStore, SavedLayout};
pub use scene::CanvasScene;
pub use tree::{NodeId, PropValue, PropertyTree, TreeObserver};
pub use viewer::{PumpEvent, ViewerApp};
