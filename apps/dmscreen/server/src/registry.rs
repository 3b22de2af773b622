use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::extract::ws::Message;
use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};
use slab::Slab;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

pub const DEFAULT_PER_CONNECTION_BUFFER: usize = 256;

/// The live connection set. It holds no application data: only a sender per
/// open socket, so frames can be fanned out to everyone but their origin.
///
/// Each outbound queue keeps the newest `per_connection_buffer` frames. A
/// peer that falls further behind loses its oldest queued frames, never the
/// latest one.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    connections: Mutex<ConnectionSet>,
    per_connection_buffer: usize,
    totals: Totals,
}

struct ConnectionSet {
    slab: Slab<ConnectionEntry>,
    index_map: HashMap<Uuid, usize>,
}

struct ConnectionEntry {
    id: Uuid,
    sender: broadcast::Sender<Message>,
}

#[derive(Default)]
struct Totals {
    connections: AtomicU64,
    messages: AtomicU64,
    bytes: AtomicU64,
    dropped: AtomicU64,
}

pub struct Registration {
    pub connection_id: Uuid,
    pub receiver: broadcast::Receiver<Message>,
    pub active_connections: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastMetrics {
    pub delivered: usize,
    pub bytes: usize,
    pub dropped: usize,
    pub closed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub active_connections: usize,
    pub total_connections: u64,
    pub total_messages_forwarded: u64,
    pub total_bytes_forwarded: u64,
    pub total_frames_dropped: u64,
}

impl ConnectionRegistry {
    /// `per_connection_buffer` is rounded up to a power of two, the queue
    /// sizes the channel actually allocates.
    pub fn new(per_connection_buffer: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connections: Mutex::new(ConnectionSet {
                    slab: Slab::new(),
                    index_map: HashMap::new(),
                }),
                per_connection_buffer: per_connection_buffer.max(1).next_power_of_two(),
                totals: Totals::default(),
            }),
        }
    }

    pub async fn register(&self) -> Registration {
        let (tx, rx) = broadcast::channel(self.inner.per_connection_buffer);
        let connection_id = Uuid::new_v4();

        let active_connections = {
            let mut guard = self.inner.connections.lock().await;
            let key = guard.slab.insert(ConnectionEntry {
                id: connection_id,
                sender: tx,
            });
            guard.index_map.insert(connection_id, key);
            guard.slab.len()
        };

        self.inner.totals.connections.fetch_add(1, Ordering::Relaxed);
        counter!("dmscreen_connections_total", 1);
        gauge!("dmscreen_connections_active", active_connections as f64);

        Registration {
            connection_id,
            receiver: rx,
            active_connections,
        }
    }

    /// Removes a connection. Returns how many remain.
    pub async fn unregister(&self, connection_id: Uuid) -> usize {
        let active_connections = {
            let mut guard = self.inner.connections.lock().await;
            if let Some(index) = guard.index_map.remove(&connection_id) {
                guard.slab.remove(index);
            }
            guard.slab.len()
        };
        gauge!("dmscreen_connections_active", active_connections as f64);
        active_connections
    }

    /// Forwards `message` untouched to every connection except `source_id`.
    ///
    /// Recipients are snapshotted under the lock and delivered to after it is
    /// released, so peers joining or leaving mid-broadcast never disturb the
    /// iteration. A full queue sheds its oldest frame to make room; a peer
    /// whose receiver is gone is evicted.
    pub async fn broadcast(&self, source_id: Uuid, message: Message) -> BroadcastMetrics {
        let mut metrics = BroadcastMetrics::default();

        let recipients: Vec<(Uuid, broadcast::Sender<Message>)> = {
            let guard = self.inner.connections.lock().await;
            guard
                .slab
                .iter()
                .filter(|(_, entry)| entry.id != source_id)
                .map(|(_, entry)| (entry.id, entry.sender.clone()))
                .collect()
        };

        let bytes = message_len(&message);
        let mut closed = Vec::new();
        let capacity = self.inner.per_connection_buffer;
        for (connection_id, sender) in recipients {
            let full = sender.len() >= capacity;
            match sender.send(message.clone()) {
                Ok(_) => {
                    metrics.delivered += 1;
                    metrics.bytes += bytes;
                    if full {
                        metrics.dropped += 1;
                        counter!("dmscreen_flow_control_drops_total", 1);
                    }
                }
                Err(_) => {
                    metrics.closed += 1;
                    closed.push(connection_id);
                }
            }
        }

        for connection_id in closed {
            self.unregister(connection_id).await;
        }

        self.record(&metrics);
        metrics
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.lock().await.slab.len()
    }

    pub async fn stats(&self) -> RegistryStats {
        let totals = &self.inner.totals;
        RegistryStats {
            active_connections: self.connection_count().await,
            total_connections: totals.connections.load(Ordering::Relaxed),
            total_messages_forwarded: totals.messages.load(Ordering::Relaxed),
            total_bytes_forwarded: totals.bytes.load(Ordering::Relaxed),
            total_frames_dropped: totals.dropped.load(Ordering::Relaxed),
        }
    }

    fn record(&self, metrics: &BroadcastMetrics) {
        let totals = &self.inner.totals;
        if metrics.dropped > 0 {
            totals
                .dropped
                .fetch_add(metrics.dropped as u64, Ordering::Relaxed);
        }
        if metrics.delivered == 0 {
            return;
        }

        totals
            .messages
            .fetch_add(metrics.delivered as u64, Ordering::Relaxed);
        totals
            .bytes
            .fetch_add(metrics.bytes as u64, Ordering::Relaxed);

        counter!("dmscreen_messages_forwarded_total", metrics.delivered as u64);
        if metrics.bytes > 0 {
            counter!("dmscreen_bytes_forwarded_total", metrics.bytes as u64);
            histogram!(
                "dmscreen_message_size_bytes",
                metrics.bytes as f64 / metrics.delivered as f64
            );
        }
    }
}

fn message_len(message: &Message) -> usize {
    match message {
        Message::Text(text) => text.len(),
        Message::Binary(bytes) => bytes.len(),
        _ => 0,
    }
}
