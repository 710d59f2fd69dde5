//! One mirrored canvas.
//!
//! [`CanvasConnection`] ties a [`MirrorSession`] to the [`CanvasScene`] that renders
//! it and to the transport task feeding it. The scene is passed as the tree
//! observer whenever the session mutates the tree, so the element tree always
//! follows the property tree without any back-references.

use serde::{Deserialize, Serialize};

use super::images::SharedImageLoader;
use super::remote::{TransportEvent, TransportHandle, TransportId, TransportSender, spawn_transport};
use super::session::{ApplyReport, MirrorSession};
use super::status::ConnectionStatus;
use crate::error::{CanvasError, Result};
use crate::scene::{CanvasScene, PaintContext, SceneEvent};
use crate::tree::snapshot::PropertySnapshot;

/// Save blob of one connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub root_path: String,
    /// Property tree at save time, shown when restoring without a live connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PropertySnapshot>,
}

impl ConnectionState {
    /// Whether the blob names a server to reconnect to.
    pub fn has_host(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }
}

/// A mirrored canvas: session, element scene and transport.
#[derive(Debug)]
pub struct CanvasConnection {
    key: u64,
    host: String,
    port: u16,
    mirror_prefix: String,
    session: MirrorSession,
    scene: CanvasScene,
    transport: Option<TransportHandle>,
    generation: u64,
}

impl CanvasConnection {
    pub fn new(key: u64, root_path: &str, images: Option<SharedImageLoader>) -> Self {
        Self {
            key,
            host: String::new(),
            port: 0,
            mirror_prefix: String::new(),
            session: MirrorSession::new(root_path),
            scene: CanvasScene::new(images),
            transport: None,
            generation: 0,
        }
    }

    /// Rebuild a connection from a save blob.
    ///
    /// A blob carrying a snapshot is shown immediately in `Snapshot` status. A
    /// snapshot that cannot be restored is dropped and the connection is left
    /// `Disconnected` with an empty tree.
    pub fn restore_state(
        key: u64,
        state: &ConnectionState,
        images: Option<SharedImageLoader>,
    ) -> Self {
        let mut connection = Self::new(key, &state.root_path, images);
        connection.set_network_config(&state.host, state.port);
        if let Some(snapshot) = &state.snapshot {
            match connection
                .session
                .enter_snapshot(snapshot, &mut connection.scene)
            {
                Ok(_) => connection.scene.rebuild(connection.session.tree()),
                Err(e) => {
                    tracing::warn!(root = %state.root_path, error = %e, "discarding unreadable snapshot");
                    connection.session.close(&mut connection.scene);
                }
            }
        }
        connection
    }

    /// Save blob with the current tree.
    pub fn save_state(&self) -> ConnectionState {
        ConnectionState {
            host: self.host.clone(),
            port: self.port,
            root_path: self.session.root_path().to_owned(),
            snapshot: self
                .session
                .status()
                .has_tree()
                .then(|| self.session.snapshot())
                .flatten(),
        }
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn root_path(&self) -> &str {
        self.session.root_path()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.session.status()
    }

    pub fn session(&self) -> &MirrorSession {
        &self.session
    }

    pub fn scene(&self) -> &CanvasScene {
        &self.scene
    }

    /// Display name: the last component of the root path.
    pub fn name(&self) -> &str {
        self.root_path()
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("/")
    }

    pub fn set_network_config(&mut self, host: &str, port: u16) {
        self.host = host.to_owned();
        self.port = port;
    }

    /// Path inserted between `host:port` and the root path (e.g. `/PropertyTreeMirror`).
    pub fn set_mirror_prefix(&mut self, prefix: &str) {
        self.mirror_prefix = prefix.trim_end_matches('/').to_owned();
    }

    pub fn set_root_path(&mut self, root_path: &str) {
        self.session.set_root_path(root_path);
    }

    /// `ws://{host}:{port}{prefix}{rootPath}`.
    pub fn mirror_url(&self) -> String {
        format!(
            "ws://{}:{}{}{}",
            self.host,
            self.port,
            self.mirror_prefix,
            self.session.root_path()
        )
    }

    /// Open the mirror socket. Events arrive on `events` and must be handed back
    /// through [`handle_transport_event`](Self::handle_transport_event).
    pub fn connect(&mut self, events: &TransportSender) -> Result<()> {
        if self.host.is_empty() || self.port == 0 {
            return Err(CanvasError::Config("no host or port to connect to".into()));
        }
        if self.status() == ConnectionStatus::Connected {
            self.drop_transport();
            self.session.mark_disconnected(None);
        }
        if !self.session.begin_connecting() {
            return Err(CanvasError::Transport(format!(
                "cannot connect from status {}",
                self.status()
            )));
        }

        self.drop_transport();
        self.generation += 1;
        let id = TransportId {
            connection: self.key,
            generation: self.generation,
        };
        match spawn_transport(self.mirror_url(), id, events.clone()) {
            Ok(handle) => {
                self.transport = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.session.mark_disconnected(Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Drop the live socket (if any) and connect again.
    pub fn reconnect(&mut self, events: &TransportSender) -> Result<()> {
        self.connect(events)
    }

    /// Explicit close: stop the transport and destroy the mirrored tree.
    pub fn close(&mut self) {
        self.drop_transport();
        self.session.close(&mut self.scene);
    }

    fn drop_transport(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
    }

    /// Apply an event from this connection's transport.
    ///
    /// Events from a superseded transport are ignored. Returns the apply report for
    /// update messages.
    pub fn handle_transport_event(
        &mut self,
        id: TransportId,
        event: TransportEvent,
    ) -> Option<ApplyReport> {
        if self.transport.as_ref().map(TransportHandle::id) != Some(id) {
            tracing::debug!(?id, "ignoring event from stale transport");
            return None;
        }

        match event {
            TransportEvent::Connected => {
                if self.session.enter_connected(&mut self.scene) {
                    self.scene.rebuild(self.session.tree());
                }
                None
            }
            TransportEvent::Message(text) => self.apply_message(&text),
            TransportEvent::Closed { reason } => {
                self.transport = None;
                self.session.mark_disconnected(reason);
                self.scene.request_paint();
                None
            }
        }
    }

    /// Apply one update frame while connected.
    pub fn apply_message(&mut self, text: &str) -> Option<ApplyReport> {
        if self.status() != ConnectionStatus::Connected {
            tracing::debug!(status = %self.status(), "dropping update outside Connected");
            return None;
        }
        match self.session.apply_message(text, &mut self.scene) {
            Ok(report) => {
                tracing::debug!(
                    created = report.created,
                    removed = report.removed,
                    changed = report.changed,
                    warnings = report.warnings.len(),
                    "applied update"
                );
                Some(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring undecodable update message");
                None
            }
        }
    }

    /// Paint the scene. Clears the pending paint request.
    pub fn paint(&mut self, ctx: &mut dyn PaintContext) {
        self.scene.paint(self.session.tree(), ctx);
    }

    pub fn take_paint_request(&mut self) -> bool {
        self.scene.take_paint_request()
    }

    pub fn take_scene_events(&mut self) -> Vec<SceneEvent> {
        self.scene.take_events()
    }

    pub fn image_loaded(&mut self, path: &str) {
        self.scene.image_loaded(path);
    }
}
