//! WebSocket transport for a property mirror.
//!
//! Each open mirror runs one background task that reads text frames and forwards
//! them, tagged with a [`TransportId`], to a single event channel owned by the
//! control thread. The transport never touches session state and never retries:
//! when the socket closes or fails it reports [`TransportEvent::Closed`] once and
//! exits. Reconnecting is the caller's decision.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{CanvasError, Result};

/// Keep-alive ping interval.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Identifies the transport an event came from.
///
/// `generation` changes on every (re)connect so events from a superseded socket
/// can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportId {
    pub connection: u64,
    pub generation: u64,
}

/// What a transport task reports.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The WebSocket handshake completed.
    Connected,
    /// A text frame.
    Message(String),
    /// The socket is gone. `reason` is `None` for a clean close.
    Closed { reason: Option<String> },
}

/// Channel every transport reports on.
pub type TransportSender = mpsc::UnboundedSender<(TransportId, TransportEvent)>;
pub type TransportReceiver = mpsc::UnboundedReceiver<(TransportId, TransportEvent)>;

/// Handle of a running transport task. Dropping it closes the socket.
#[derive(Debug)]
pub struct TransportHandle {
    id: TransportId,
    url: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TransportHandle {
    pub fn id(&self) -> TransportId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ask the task to close the socket. No `Closed` event follows.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Open `url` on a background task.
///
/// Must be called from within a tokio runtime.
pub fn spawn_transport(
    url: impl Into<String>,
    id: TransportId,
    events: TransportSender,
) -> Result<TransportHandle> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| CanvasError::Transport(format!("no async runtime: {e}")))?;
    let url = url.into();
    let cancel = CancellationToken::new();

    let task_url = url.clone();
    let task_cancel = cancel.clone();
    let task = runtime.spawn(async move {
        run_transport(task_url, id, events, task_cancel).await;
    });

    Ok(TransportHandle {
        id,
        url,
        cancel,
        task,
    })
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

async fn run_transport(
    url: String,
    id: TransportId,
    events: TransportSender,
    cancel: CancellationToken,
) {
    tracing::info!(%url, "opening mirror connection");
    let result = try_connect(&url, id, &events, &cancel).await;
    if cancel.is_cancelled() {
        tracing::debug!(%url, "mirror connection closed locally");
        return;
    }

    let reason = match result {
        Ok(()) => {
            tracing::info!(%url, "mirror connection closed by server");
            None
        }
        Err(e) => {
            tracing::warn!(%url, error = %e, "mirror connection failed");
            Some(e)
        }
    };
    // The receiver is gone only during shutdown.
    let _ = events.send((id, TransportEvent::Closed { reason }));
}

/// Run one connection until it closes. `Ok(())` on a clean close or local
/// cancellation, `Err` on failure.
async fn try_connect(
    url: &str,
    id: TransportId,
    events: &TransportSender,
    cancel: &CancellationToken,
) -> std::result::Result<(), String> {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    let (ws_stream, _) = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        connected = connect_async(url) => connected.map_err(|e| format!("connect: {e}"))?,
    };
    let (mut write, mut read) = ws_stream.split();

    if events.send((id, TransportEvent::Connected)).is_err() {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // Skip the first immediate tick.
    ping_interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if events.send((id, TransportEvent::Message(text))).is_err() {
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(e)) => return Err(format!("read error: {e}")),
                    _ => {} // Binary, Ping/Pong frames handled by tungstenite.
                }
            }
            _ = ping_interval.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    return Err(format!("ping error: {e}"));
                }
            }
        }
    }
}
