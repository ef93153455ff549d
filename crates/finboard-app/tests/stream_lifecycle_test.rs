//! Stream client lifecycle integration tests.
//!
//! Tests the connection lifecycle:
//! - Connection establishment and message delivery
//! - Outbound sends
//! - Reconnection after a server-side close
//! - Manual disconnect suppressing reconnects

mod integration;
use integration::common::mock_ws::MockWsServer;

use finboard_stream::{StreamClient, StreamConfig, StreamEvent, StreamPayload, StreamState};
use parking_lot::Mutex;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

type Recorded = Arc<Mutex<Vec<StreamEvent>>>;

fn client_for(url: String, reconnect_interval_ms: u64) -> (Arc<StreamClient>, Recorded) {
    let events: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let client = StreamClient::new(
        StreamConfig {
            url,
            reconnect_interval_ms,
            max_reconnect_attempts: 3,
        },
        Arc::new(move |event| sink.lock().push(event)),
    );
    (client, events)
}

async fn wait_until<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(Duration::from_secs(5), async {
        loop {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}

fn messages(events: &Recorded) -> Vec<StreamPayload> {
    events
        .lock()
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Message(payload) => Some(payload.clone()),
            _ => None,
        })
        .collect()
}

/// Test that the client connects and reports Opened.
#[tokio::test]
async fn test_stream_connects_to_server() {
    let server = MockWsServer::start().await;
    let (client, events) = client_for(server.url(), 50);

    client.connect();
    assert!(wait_until(|| async { client.is_connected() }).await);
    assert!(wait_until(|| async { server.connection_count().await == 1 }).await);
    assert_eq!(events.lock().first(), Some(&StreamEvent::Opened));

    // connect() while live is a no-op
    client.connect();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.connection_count().await, 1);

    client.disconnect();
    server.shutdown().await;
}

/// Test that JSON frames are parsed and other text is delivered raw.
#[tokio::test]
async fn test_stream_delivers_messages() {
    let server = MockWsServer::start().await;
    let (client, events) = client_for(server.url(), 50);

    client.connect();
    assert!(wait_until(|| async { server.connection_count().await == 1 }).await);

    server.push(r#"{"price": 42}"#);
    server.push("heartbeat");

    assert!(wait_until(|| async { messages(&events).len() == 2 }).await);
    assert_eq!(
        messages(&events),
        vec![
            StreamPayload::Json(json!({"price": 42})),
            StreamPayload::Raw("heartbeat".to_string()),
        ]
    );

    client.disconnect();
    server.shutdown().await;
}

/// Test that send() reaches the server: strings verbatim, values serialized.
#[tokio::test]
async fn test_stream_sends_messages() {
    let server = MockWsServer::start().await;
    let (client, _events) = client_for(server.url(), 50);

    client.connect();
    assert!(wait_until(|| async { client.is_connected() }).await);

    client.send(&json!({"op": "subscribe", "channel": "btc"}));
    client.send(&json!("ping"));

    assert!(wait_until(|| async { server.received_messages().await.len() == 2 }).await);
    let received = server.received_messages().await;
    let first: serde_json::Value = serde_json::from_str(&received[0]).unwrap();
    assert_eq!(first, json!({"op": "subscribe", "channel": "btc"}));
    assert_eq!(received[1], "ping");

    client.disconnect();
    server.shutdown().await;
}

/// Test that a server-side close triggers a reconnect that resets the budget.
#[tokio::test]
async fn test_stream_reconnects_after_server_close() {
    let server = MockWsServer::start().await;
    let (client, events) = client_for(server.url(), 50);

    client.connect();
    assert!(wait_until(|| async { server.connection_count().await == 1 }).await);

    server.close_all();
    assert!(wait_until(|| async { server.connection_count().await == 2 }).await);
    assert!(
        wait_until(|| async { client.is_connected() && client.reconnect_attempts() == 0 }).await
    );

    let recorded = events.lock().clone();
    assert!(recorded.contains(&StreamEvent::Closed { reconnecting: true }));
    assert_eq!(
        recorded.iter().filter(|e| **e == StreamEvent::Opened).count(),
        2
    );

    client.disconnect();
    server.shutdown().await;
}

/// Test that disconnect() closes the socket and nothing reconnects.
#[tokio::test]
async fn test_disconnect_prevents_reconnect() {
    let server = MockWsServer::start().await;
    let (client, events) = client_for(server.url(), 50);

    client.connect();
    assert!(wait_until(|| async { client.is_connected() }).await);

    client.disconnect();
    assert_eq!(client.state(), StreamState::Closed);
    let seen = events.lock().len();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connection_count().await, 1);
    assert_eq!(events.lock().len(), seen, "no events after disconnect");

    // A disconnected client stays closed
    client.connect();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.connection_count().await, 1);
    assert!(!client.is_connected());

    server.shutdown().await;
}
