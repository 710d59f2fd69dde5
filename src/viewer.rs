//! Application controller.
//!
//! [`ViewerApp`] is the composition root: it owns the shared image loader, the
//! transport event channel and every open [`CanvasConnection`]. All tree mutation
//! happens on whichever task drives [`ViewerApp::pump`]; transports and image
//! fetches only ever send events back to it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::canvas::connection::CanvasConnection;
use crate::canvas::discovery::{self, CanvasInfo};
use crate::canvas::images::{
    ByteFetcher, FetchOutcome, HttpFetcher, ImageLoader, SharedImageLoader, lock_loader,
};
use crate::canvas::registry::ConnectionRegistry;
use crate::canvas::remote::{TransportEvent, TransportId, TransportReceiver, TransportSender};
use crate::canvas::render::SvgContext;
use crate::canvas::session::ApplyReport;
use crate::canvas::status::QueryStatus;
use crate::config::ViewerConfig;
use crate::error::Result;
use crate::layout::{LayoutEntry, LayoutStore, SavedLayout};

/// What one [`ViewerApp::pump`] step handled.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpEvent {
    Transport {
        connection: u64,
        report: Option<ApplyReport>,
    },
    /// An image became available (or `None` if the fetch failed).
    Image(Option<String>),
}

/// The viewer's application state.
pub struct ViewerApp {
    config: ViewerConfig,
    query_status: QueryStatus,
    canvases: Vec<CanvasInfo>,
    connections: ConnectionRegistry,
    layouts: LayoutStore,
    layout_list: Vec<LayoutEntry>,
    images: SharedImageLoader,
    image_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    transport_tx: TransportSender,
    transport_rx: TransportReceiver,
    http: reqwest::Client,
}

impl ViewerApp {
    /// Create the application with an HTTP image fetcher for the configured host.
    pub fn new(config: ViewerConfig, layouts: LayoutStore) -> Result<Self> {
        let http = reqwest::Client::new();
        let fetcher = HttpFetcher::new(
            http.clone(),
            &config.connection.host,
            config.connection.port,
        )?;
        Ok(Self::with_fetcher(config, layouts, http, Arc::new(fetcher)))
    }

    /// Create the application with an explicit image fetcher.
    pub fn with_fetcher(
        config: ViewerConfig,
        layouts: LayoutStore,
        http: reqwest::Client,
        fetcher: Arc<dyn ByteFetcher>,
    ) -> Self {
        let (loader, image_rx) = ImageLoader::new(fetcher);
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        Self {
            config,
            query_status: QueryStatus::Idle,
            canvases: Vec::new(),
            connections: ConnectionRegistry::new(),
            layouts,
            layout_list: Vec::new(),
            images: Arc::new(Mutex::new(loader)),
            image_rx,
            transport_tx,
            transport_rx,
            http,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.config.connection.host
    }

    pub fn port(&self) -> u16 {
        self.config.connection.port
    }

    /// Change the host. Resets the query status and points image fetches at it.
    pub fn set_host(&mut self, host: &str) {
        if self.config.connection.host == host {
            return;
        }
        self.config.connection.host = host.to_owned();
        self.server_changed();
    }

    /// Change the port. Resets the query status and points image fetches at it.
    pub fn set_port(&mut self, port: u16) {
        if self.config.connection.port == port {
            return;
        }
        self.config.connection.port = port;
        self.server_changed();
    }

    fn server_changed(&mut self) {
        self.set_query_status(QueryStatus::Idle);
        match HttpFetcher::new(self.http.clone(), self.host(), self.port()) {
            Ok(fetcher) => lock_loader(&self.images).set_fetcher(Arc::new(fetcher)),
            Err(e) => tracing::warn!(error = %e, "keeping previous image server"),
        }
    }

    pub fn query_status(&self) -> QueryStatus {
        self.query_status
    }

    fn set_query_status(&mut self, status: QueryStatus) {
        if self.query_status != status {
            tracing::info!(from = %self.query_status, to = %status, "query status changed");
            self.query_status = status;
        }
    }

    /// Canvases found by the last successful query.
    pub fn canvases(&self) -> &[CanvasInfo] {
        &self.canvases
    }

    /// Ask the server which canvases exist. Does nothing without a host or port.
    pub async fn query(&mut self) -> QueryStatus {
        if self.host().is_empty() || self.port() == 0 {
            return self.query_status;
        }
        self.set_query_status(QueryStatus::Querying);

        match discovery::query_canvases(&self.http, self.host(), self.port()).await {
            Ok(canvases) => {
                self.canvases = canvases;
                self.set_query_status(QueryStatus::SuccessfulQuery);
            }
            Err(e) => {
                tracing::warn!(host = %self.host(), port = self.port(), error = %e, "canvas query failed");
                self.canvases.clear();
                self.set_query_status(QueryStatus::QueryFailed);
            }
        }
        self.query_status
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn connection_mut(&mut self, key: u64) -> Option<&mut CanvasConnection> {
        self.connections.get_mut(key)
    }

    fn new_connection(&mut self, root_path: &str) -> CanvasConnection {
        let key = self.connections.allocate_key();
        let mut connection = CanvasConnection::new(key, root_path, Some(Arc::clone(&self.images)));
        connection.set_mirror_prefix(&self.config.connection.mirror_prefix);
        connection
    }

    /// Open a mirror of `root_path` on the current host. Returns the connection key.
    ///
    /// A connection whose socket cannot be started stays registered in
    /// `Disconnected` status so the caller can retry.
    pub fn open_canvas(&mut self, root_path: &str) -> u64 {
        let mut connection = self.new_connection(root_path);
        connection.set_network_config(&self.config.connection.host, self.config.connection.port);
        if let Err(e) = connection.connect(&self.transport_tx) {
            tracing::warn!(root = %connection.root_path(), error = %e, "cannot open canvas");
        }
        let key = connection.key();
        self.connections.register(connection);
        key
    }

    /// Close and forget a connection.
    pub fn close_canvas(&mut self, key: u64) -> bool {
        match self.connections.remove(key) {
            Some(mut connection) => {
                connection.close();
                true
            }
            None => false,
        }
    }

    /// Reconnect a connection to its own host.
    pub fn reconnect(&mut self, key: u64) -> Result<()> {
        match self.connections.get_mut(key) {
            Some(connection) => connection.reconnect(&self.transport_tx),
            None => Ok(()),
        }
    }

    /// Layout describing every open canvas.
    pub fn save_state(&self, name: &str) -> SavedLayout {
        SavedLayout {
            config_name: name.to_owned(),
            canvases: self
                .connections
                .iter()
                .map(CanvasConnection::save_state)
                .collect(),
        }
    }

    /// Replace all open canvases with the ones in `layout`.
    ///
    /// Canvases with a saved tree show it right away; those with a host are
    /// reconnected. A blob that cannot be restored does not stop the others.
    pub fn restore_state(&mut self, layout: &SavedLayout) {
        for mut connection in self.connections.drain() {
            connection.close();
        }

        for state in &layout.canvases {
            let key = self.connections.allocate_key();
            let mut connection =
                CanvasConnection::restore_state(key, state, Some(Arc::clone(&self.images)));
            connection.set_mirror_prefix(&self.config.connection.mirror_prefix);
            if state.has_host()
                && let Err(e) = connection.reconnect(&self.transport_tx)
            {
                tracing::warn!(root = %state.root_path, error = %e, "cannot reconnect restored canvas");
            }
            self.connections.register(connection);
        }
        tracing::info!(name = %layout.config_name, canvases = layout.canvases.len(), "layout restored");
    }

    /// Save the open canvases as a new layout file.
    pub fn save_layout(&mut self, name: &str) -> Result<PathBuf> {
        let path = self.layouts.save(&self.save_state(name))?;
        self.layout_list.push(LayoutEntry {
            name: name.to_owned(),
            path: path.clone(),
        });
        Ok(path)
    }

    /// Load a layout file and restore it.
    pub fn restore_layout(&mut self, path: &Path) -> Result<()> {
        let layout = self.layouts.load(path)?;
        self.restore_state(&layout);
        Ok(())
    }

    /// Re-scan the layout directory.
    pub fn rebuild_layout_list(&mut self) -> Result<&[LayoutEntry]> {
        self.layout_list = self.layouts.list()?;
        Ok(&self.layout_list)
    }

    pub fn layouts(&self) -> &[LayoutEntry] {
        &self.layout_list
    }

    /// Route a transport event to its connection.
    pub fn handle_transport_event(
        &mut self,
        id: TransportId,
        event: TransportEvent,
    ) -> Option<ApplyReport> {
        match self.connections.for_transport(id) {
            Some(connection) => connection.handle_transport_event(id, event),
            None => {
                tracing::debug!(?id, "event for closed connection");
                None
            }
        }
    }

    /// Record a finished image fetch and notify every scene.
    pub fn handle_image_outcome(&mut self, outcome: FetchOutcome) -> Option<String> {
        let path = lock_loader(&self.images).complete(outcome)?;
        for connection in self.connections.iter_mut() {
            connection.image_loaded(&path);
        }
        Some(path)
    }

    /// Wait for and handle the next transport or image event.
    pub async fn pump(&mut self) -> PumpEvent {
        tokio::select! {
            Some((id, event)) = self.transport_rx.recv() => {
                let report = self.handle_transport_event(id, event);
                PumpEvent::Transport { connection: id.connection, report }
            }
            Some(outcome) = self.image_rx.recv() => {
                PumpEvent::Image(self.handle_image_outcome(outcome))
            }
            // Both senders live in `self`, so this only fires if they were dropped.
            else => std::future::pending().await,
        }
    }

    /// Keys of connections with a pending paint request, clearing the requests.
    pub fn take_paint_requests(&mut self) -> Vec<u64> {
        self.connections
            .iter_mut()
            .filter_map(|c| c.take_paint_request().then(|| c.key()))
            .collect()
    }

    /// Paint a connection into an SVG document sized to its canvas.
    pub fn render_svg(&mut self, key: u64, frameless: bool) -> Option<String> {
        let connection = self.connections.get_mut(key)?;
        let (width, height) = connection.scene().canvas_size();
        let mut ctx = SvgContext::new(width, height);
        connection.paint(&mut ctx);
        let title = format!("{} ({})", connection.name(), connection.status());
        Some(ctx.finish(&title, frameless))
    }
}

impl std::fmt::Debug for ViewerApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerApp")
            .field("host", &self.host())
            .field("port", &self.port())
            .field("query_status", &self.query_status)
            .field("connections", &self.connections.len())
            .finish()
    }
}
