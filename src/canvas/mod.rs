//! Remote canvas mirroring.
//!
//! Decodes property-mirror updates, keeps one [`session::MirrorSession`] per open
//! canvas and talks to the simulator over HTTP (discovery, images) and WebSocket
//! (mirror updates).

pub mod connection;
pub mod discovery;
pub mod images;
pub mod protocol;
pub mod registry;
pub mod remote;
pub mod render;
pub mod session;
pub mod status;

pub use connection::{CanvasConnection, ConnectionState};
pub use discovery::CanvasInfo;
pub use registry::ConnectionRegistry;
pub use session::{ApplyReport, MirrorSession, ProtocolWarning};
pub use status::{ConnectionStatus, QueryStatus};
