//! Drives `RealtimeClient` against a real relay: connect handshake, scope
//! subscription, and insert forwarding onto the engine-facing channel.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use festa_inbox::realtime::{RealtimeClient, SubScope};

/// Start a relay on a random available port
async fn start_relay() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let state = Arc::new(festa_relay::RelayState::new());

    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let ws_stream = tokio_tungstenite::accept_async(stream).await.unwrap();
            let state = state.clone();
            tokio::spawn(async move {
                festa_relay::handle_connection(ws_stream, state).await;
            });
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("ws://127.0.0.1:{}", port), handle)
}

/// Raw publisher connection: handshake, then publish rows as a second client.
async fn connect_publisher(
    url: &str,
) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    let (ws_stream, _) = connect_async(url).await.expect("Failed to connect");
    let (mut write, mut read) = ws_stream.split();

    let connect_msg = json!({
        "type": "connect",
        "client_id": "publisher",
        "token": null
    });
    write
        .send(Message::Text(connect_msg.to_string().into()))
        .await
        .unwrap();

    let response = timeout(Duration::from_secs(5), read.next())
        .await
        .expect("Timeout waiting for auth")
        .expect("Stream closed")
        .expect("Read error");
    if let Message::Text(text) = response {
        let msg: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(msg["type"], "auth_response");
        assert_eq!(msg["success"], true);
    } else {
        panic!("Expected auth_response");
    }

    write.reunite(read).unwrap()
}

fn publish_payload(id: &str, thread_id: &str, vendor_id: &str, content: &str) -> String {
    json!({
        "type": "publish",
        "row": {
            "id": id,
            "thread_id": thread_id,
            "vendor_id": vendor_id,
            "sender_id": "cust-1",
            "sender_name": "Casey",
            "content": content,
            "created_at": 42
        }
    })
    .to_string()
}

async fn wait_until_connected(client: &RealtimeClient) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !client.is_connected().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "client never connected"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    // Allow the subscribe frames to land on the relay
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_client_forwards_inserts_for_subscribed_scopes() {
    let (url, relay_handle) = start_relay().await;

    let (inserts_tx, mut inserts_rx) = mpsc::unbounded_channel();
    let client = RealtimeClient::with_url(&url);
    client
        .connect(
            "inbox-1",
            vec![
                SubScope::Thread {
                    thread_id: "t1".to_string(),
                },
                SubScope::Vendor {
                    vendor_id: "v1".to_string(),
                },
            ],
            inserts_tx,
        )
        .await;
    wait_until_connected(&client).await;

    let mut publisher = connect_publisher(&url).await;

    // Open-thread scope
    publisher
        .send(Message::Text(
            publish_payload("m1", "t1", "v1", "for the open thread").into(),
        ))
        .await
        .unwrap();
    // Vendor scope covers a background thread too
    publisher
        .send(Message::Text(
            publish_payload("m2", "t2", "v1", "for a background thread").into(),
        ))
        .await
        .unwrap();

    let first = timeout(Duration::from_secs(5), inserts_rx.recv())
        .await
        .expect("timeout waiting for insert")
        .expect("channel closed");
    assert_eq!(first.id, "m1");
    assert_eq!(first.thread_id, "t1");
    assert_eq!(first.content, "for the open thread");

    let second = timeout(Duration::from_secs(5), inserts_rx.recv())
        .await
        .expect("timeout waiting for insert")
        .expect("channel closed");
    assert_eq!(second.id, "m2");
    assert_eq!(second.thread_id, "t2");

    // A row for another vendor never reaches the channel.
    publisher
        .send(Message::Text(
            publish_payload("m3", "t9", "v9", "wrong inbox").into(),
        ))
        .await
        .unwrap();
    assert!(
        timeout(Duration::from_millis(300), inserts_rx.recv())
            .await
            .is_err(),
        "unsubscribed rows must not be forwarded"
    );

    client.disconnect();
    relay_handle.abort();
}

#[tokio::test]
async fn test_disconnect_stops_the_client() {
    let (url, relay_handle) = start_relay().await;

    let (inserts_tx, _inserts_rx) = mpsc::unbounded_channel();
    let client = RealtimeClient::with_url(&url);
    client
        .connect(
            "inbox-2",
            vec![SubScope::Vendor {
                vendor_id: "v1".to_string(),
            }],
            inserts_tx,
        )
        .await;
    wait_until_connected(&client).await;

    client.disconnect();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while client.is_connected().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "client never disconnected"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    relay_handle.abort();
}
