use std::time::Duration;

use dmscreen_core::SyncMessage;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::connection::{ConnectionState, LinkEvent, ReconnectPolicy};
use crate::error::SyncError;

/// How long [`SyncClient::close`] waits for queued frames to flush.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay endpoint, e.g. `ws://192.168.1.20:8080`.
    pub url: String,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Notifications for whoever renders the screen.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connecting { attempt: u64 },
    Connected,
    Disconnected,
    Message(SyncMessage),
}

/// Handle to the background task that owns the relay connection.
///
/// Dropping the handle stops the task.
pub struct SyncClient {
    outbound: Option<mpsc::UnboundedSender<String>>,
    state: watch::Receiver<ConnectionState>,
    task: Option<JoinHandle<()>>,
}

impl SyncClient {
    /// Starts connecting immediately. Received messages and lifecycle changes
    /// arrive on the returned receiver.
    ///
    /// The event channel is unbounded: a caller that only sends should drop
    /// the receiver rather than hold it unread, or every relayed message is
    /// kept for the life of the client. Dropping it does not stop the client.
    pub fn spawn(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let task = tokio::spawn(supervise(config, outbound_rx, state_tx, events_tx));

        (
            Self {
                outbound: Some(outbound_tx),
                state: state_rx,
                task: Some(task),
            },
            events_rx,
        )
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Resolves once the client is connected, which may be immediately.
    pub async fn wait_connected(&self) -> Result<(), SyncError> {
        let mut state = self.state.clone();
        state
            .wait_for(|state| state.is_connected())
            .await
            .map(|_| ())
            .map_err(|_| SyncError::Stopped)
    }

    /// Sends a full snapshot to every other peer.
    ///
    /// Returns `Ok(false)` without sending anything when not connected; there
    /// is no outbound buffer, the next local change carries the state anyway.
    pub fn send(&self, message: &SyncMessage) -> Result<bool, SyncError> {
        if !self.is_connected() {
            debug!(kind = message.tag(), "not connected; dropping update");
            return Ok(false);
        }
        let text = message.encode()?;
        let outbound = self.outbound.as_ref().ok_or(SyncError::Stopped)?;
        outbound.send(text).map_err(|_| SyncError::Stopped)?;
        Ok(true)
    }

    /// Flushes anything already queued on the open connection, then stops.
    pub async fn close(mut self) {
        drop(self.outbound.take());
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum SessionEnd {
    Closed,
    Shutdown,
}

async fn supervise(
    config: ClientConfig,
    mut outbound: mpsc::UnboundedReceiver<String>,
    state_tx: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<SyncEvent>,
) {
    let mut state = ConnectionState::Disconnected;
    let mut failures: u64 = 0;

    loop {
        let attempt = failures + 1;
        state = advance(&state_tx, state, LinkEvent::Dial);
        let _ = events.send(SyncEvent::Connecting { attempt });
        debug!(url = %config.url, attempt, "connecting to relay");

        match connect_async(config.url.as_str()).await {
            Ok((stream, _)) => {
                discard_stale(&mut outbound);
                state = advance(&state_tx, state, LinkEvent::Opened);
                info!(url = %config.url, "connected to relay");
                let _ = events.send(SyncEvent::Connected);
                failures = 0;

                let end = run_session(stream, &mut outbound, &events).await;
                state = advance(&state_tx, state, LinkEvent::Closed);
                let _ = events.send(SyncEvent::Disconnected);
                if let SessionEnd::Shutdown = end {
                    return;
                }
                info!(url = %config.url, "relay connection closed; reconnecting");
            }
            Err(err) => {
                state = advance(&state_tx, state, LinkEvent::Failed);
                let _ = events.send(SyncEvent::Disconnected);
                warn!(url = %config.url, attempt, error = %err, "relay connection failed");
            }
        }

        failures += 1;
        let delay = config.reconnect.delay_after(failures);
        if !wait_before_retry(delay, &mut outbound).await {
            return;
        }
    }
}

fn advance(
    state_tx: &watch::Sender<ConnectionState>,
    state: ConnectionState,
    event: LinkEvent,
) -> ConnectionState {
    let next = state.on(event);
    state_tx.send_replace(next);
    next
}

/// Drops frames queued for a connection that no longer exists.
fn discard_stale(outbound: &mut mpsc::UnboundedReceiver<String>) {
    let mut dropped = 0usize;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!(dropped, "discarded updates queued before reconnect");
    }
}

/// Sleeps out the reconnect delay. Returns `false` if the handle went away in
/// the meantime.
async fn wait_before_retry(
    delay: Duration,
    outbound: &mut mpsc::UnboundedReceiver<String>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            frame = outbound.recv() => {
                if frame.is_none() {
                    return false;
                }
                debug!("dropping update sent while disconnected");
            }
        }
    }
}

async fn run_session(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    events: &mpsc::UnboundedSender<SyncEvent>,
) -> SessionEnd {
    let (mut ws_tx, mut ws_rx) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(err) = ws_tx.send(Message::Text(text)).await {
                        warn!(error = %err, "failed to send to relay");
                        return SessionEnd::Closed;
                    }
                }
                None => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => deliver(SyncMessage::decode(&text), events),
                Some(Ok(Message::Binary(bytes))) => deliver(SyncMessage::decode_slice(&bytes), events),
                Some(Ok(Message::Close(frame))) => {
                    debug!(reason = ?frame.map(|f| f.reason.to_string()), "relay closed websocket");
                    return SessionEnd::Closed;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %err, "error receiving from relay");
                    return SessionEnd::Closed;
                }
                None => return SessionEnd::Closed,
            },
        }
    }
}

fn deliver(
    decoded: Result<SyncMessage, dmscreen_core::EnvelopeError>,
    events: &mpsc::UnboundedSender<SyncEvent>,
) {
    match decoded {
        Ok(message) => {
            if let SyncMessage::Unknown { kind, .. } = &message {
                debug!(kind = %kind, "received message with unknown type");
            }
            let _ = events.send(SyncEvent::Message(message));
        }
        Err(err) => warn!(error = %err, "dropping undecodable frame"),
    }
}
