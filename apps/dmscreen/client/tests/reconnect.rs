use std::time::{Duration, Instant};

use dmscreen_client::{
    ClientConfig, ConnectionState, GameSystem, ReconnectPolicy, SyncClient, SyncEvent, SyncMessage,
};
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpListener, sync::mpsc::UnboundedReceiver, time::timeout};
use tokio_tungstenite::{accept_async, tungstenite::Message};

const RETRY: Duration = Duration::from_millis(150);
const WAIT: Duration = Duration::from_secs(5);

fn config(addr: std::net::SocketAddr) -> ClientConfig {
    ClientConfig::new(format!("ws://{addr}")).with_reconnect(ReconnectPolicy::fixed(RETRY))
}

async fn next_event(events: &mut UnboundedReceiver<SyncEvent>) -> SyncEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

async fn expect_event(events: &mut UnboundedReceiver<SyncEvent>, want: SyncEvent) {
    assert_eq!(next_event(events).await, want);
}

#[tokio::test]
async fn closed_connection_is_redialed_after_the_fixed_delay() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, mut events) = SyncClient::spawn(config(addr));

    let (stream, _) = listener.accept().await.unwrap();
    let mut first = accept_async(stream).await.unwrap();
    expect_event(&mut events, SyncEvent::Connecting { attempt: 1 }).await;
    expect_event(&mut events, SyncEvent::Connected).await;

    first.close(None).await.unwrap();
    drop(first);
    expect_event(&mut events, SyncEvent::Disconnected).await;
    let dropped_at = Instant::now();

    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let redial_after = dropped_at.elapsed();
    let _second = accept_async(stream).await.unwrap();
    expect_event(&mut events, SyncEvent::Connecting { attempt: 2 }).await;
    expect_event(&mut events, SyncEvent::Connected).await;

    assert!(
        redial_after >= RETRY - Duration::from_millis(20),
        "redialed after {redial_after:?}"
    );
    assert!(client.is_connected());
}

#[tokio::test]
async fn failed_dials_keep_retrying_until_the_relay_appears() {
    let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = reserved.local_addr().unwrap();
    drop(reserved);

    let (client, mut events) = SyncClient::spawn(config(addr));

    let mut stamps = Vec::new();
    for attempt in 1..=3 {
        expect_event(&mut events, SyncEvent::Connecting { attempt }).await;
        stamps.push(Instant::now());
        expect_event(&mut events, SyncEvent::Disconnected).await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    // Fixed delay: no growth between attempts.
    for pair in stamps.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= RETRY - Duration::from_millis(20), "gap {gap:?}");
        assert!(gap < RETRY * 4, "gap {gap:?}");
    }

    let listener = TcpListener::bind(addr).await.unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.next().await
    });

    timeout(WAIT, client.wait_connected())
        .await
        .expect("never reconnected")
        .unwrap();

    let game = SyncMessage::game(GameSystem::Dnd5e);
    assert!(client.send(&game).unwrap());
    let received = timeout(WAIT, server).await.unwrap().unwrap();
    match received {
        Some(Ok(Message::Text(text))) => {
            assert_eq!(SyncMessage::decode(&text).unwrap(), game);
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn send_is_a_no_op_while_disconnected() {
    let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = reserved.local_addr().unwrap();
    drop(reserved);

    let (client, mut events) = SyncClient::spawn(config(addr));
    expect_event(&mut events, SyncEvent::Connecting { attempt: 1 }).await;
    expect_event(&mut events, SyncEvent::Disconnected).await;

    let sent = client
        .send(&SyncMessage::game(GameSystem::Placeholder))
        .unwrap();
    assert!(!sent);
}

#[tokio::test]
async fn received_snapshots_surface_as_events() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (_client, mut events) = SyncClient::spawn(config(addr));

    let (stream, _) = listener.accept().await.unwrap();
    let mut relay = accept_async(stream).await.unwrap();
    expect_event(&mut events, SyncEvent::Connecting { attempt: 1 }).await;
    expect_event(&mut events, SyncEvent::Connected).await;

    relay
        .send(Message::Text("{broken".into()))
        .await
        .unwrap();
    relay
        .send(Message::Text(r#"{"type":"dice-roll","payload":4}"#.into()))
        .await
        .unwrap();
    relay
        .send(Message::Text(r#"{"type":"game-change","payload":"D&D 5e"}"#.into()))
        .await
        .unwrap();

    match next_event(&mut events).await {
        SyncEvent::Message(SyncMessage::Unknown { kind, .. }) => assert_eq!(kind, "dice-roll"),
        other => panic!("unexpected event: {other:?}"),
    }
    expect_event(
        &mut events,
        SyncEvent::Message(SyncMessage::GameChange(GameSystem::Dnd5e)),
    )
    .await;
}

#[tokio::test]
async fn dropping_the_event_receiver_keeps_the_client_running() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, events) = SyncClient::spawn(config(addr));
    drop(events);

    let (stream, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    let mut relay = accept_async(stream).await.unwrap();
    timeout(WAIT, client.wait_connected())
        .await
        .expect("never connected")
        .unwrap();

    relay
        .send(Message::Text(r#"{"type":"game-change","payload":"D&D 5e"}"#.into()))
        .await
        .unwrap();

    let game = SyncMessage::game(GameSystem::Placeholder);
    assert!(client.send(&game).unwrap());
    match timeout(WAIT, relay.next()).await.unwrap() {
        Some(Ok(Message::Text(text))) => assert_eq!(SyncMessage::decode(&text).unwrap(), game),
        other => panic!("unexpected frame: {other:?}"),
    }
}
