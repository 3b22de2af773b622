#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use dmscreen_server::{AppState, ConnectionRegistry, SystemInterfaces};
use futures_util::StreamExt;
use dmscreen_server::telemetry::metrics_builder;
use tokio::{net::TcpListener, net::TcpStream, task::JoinHandle, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type Peer = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);
pub const QUIET_WINDOW: Duration = Duration::from_millis(200);

pub struct Relay {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    task: JoinHandle<()>,
}

impl Relay {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(AppState::new(
            ConnectionRegistry::new(64),
            std::env::temp_dir().join("dmscreen-relay-tests-no-public"),
            Arc::new(SystemInterfaces),
            metrics_builder().unwrap().build_recorder().handle(),
        ));
        let task = tokio::spawn({
            let state = state.clone();
            async move {
                dmscreen_server::serve(listener, state, std::future::pending())
                    .await
                    .unwrap();
            }
        });
        Self { addr, state, task }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn connect(&self) -> Peer {
        let (stream, _) = connect_async(self.url()).await.unwrap();
        stream
    }

    /// Waits until the relay has registered exactly `count` connections.
    pub async fn wait_for_connections(&self, count: usize) {
        timeout(RECV_TIMEOUT, async {
            while self.state.registry.connection_count().await != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("relay never reached {count} connections"));
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Next data frame, skipping pings and pongs.
pub async fn next_frame(peer: &mut Peer) -> Message {
    timeout(RECV_TIMEOUT, async {
        loop {
            match peer.next().await {
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(frame)) => return frame,
                other => panic!("peer stream ended: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for frame")
}

pub async fn assert_silent(peer: &mut Peer) {
    if let Ok(Some(frame)) = timeout(QUIET_WINDOW, peer.next()).await {
        panic!("unexpected frame: {frame:?}");
    }
}
