use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Runs one relay connection until the peer goes away. Socket errors end the
/// connection; they are logged, never surfaced to other peers.
pub async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let registration = state.registry.register().await;
    let connection_id = registration.connection_id;
    let mut rx = registration.receiver;

    info!(
        connection_id = %connection_id,
        active_connections = registration.active_connections,
        "client connected"
    );

    let writer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    if ws_tx.send(message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(connection_id = %connection_id, skipped, "slow peer skipped stale frames");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(connection_id = %connection_id, "writer task finished");
    });

    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(frame) => match frame {
                Message::Close(frame) => {
                    info!(
                        connection_id = %connection_id,
                        reason = ?frame.map(|f| f.reason.to_string()),
                        "client closed websocket"
                    );
                    break;
                }
                Message::Text(_) | Message::Binary(_) => {
                    let metrics = state.registry.broadcast(connection_id, frame).await;
                    if metrics.dropped > 0 || metrics.closed > 0 {
                        debug!(
                            connection_id = %connection_id,
                            delivered = metrics.delivered,
                            dropped = metrics.dropped,
                            closed = metrics.closed,
                            "partial fan-out"
                        );
                    }
                }
                _ => continue,
            },
            Err(err) => {
                warn!(
                    connection_id = %connection_id,
                    error = %err,
                    "error receiving message"
                );
                break;
            }
        }
    }

    let active = state.registry.unregister(connection_id).await;
    counter!("dmscreen_connections_closed_total", 1);
    writer.abort();

    info!(
        connection_id = %connection_id,
        active_connections = active,
        "client disconnected"
    );
}
