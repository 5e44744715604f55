use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::{error, info, warn};

use crate::messages::RelayMessage;
use crate::state::RelayState;

/// Handle a single WebSocket connection
pub async fn handle_connection(ws_stream: WebSocketStream<TcpStream>, state: Arc<RelayState>) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Wait for the Connect message before anything else
    let client_id = match wait_for_connect(&mut ws_receiver).await {
        Some(id) => id,
        None => {
            warn!("Connection closed before authentication");
            return;
        }
    };

    info!("Client connected: {}", client_id);

    // Channel feeding this connection's writer
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.add_client(client_id.clone(), tx);

    let auth_response = RelayMessage::AuthResponse {
        success: true,
        message: "Connected to relay".to_string(),
    };
    match serde_json::to_string(&auth_response) {
        Ok(json) => {
            if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                error!("Failed to send auth response to {}: {}", client_id, e);
            }
        }
        Err(e) => {
            error!("Failed to serialize auth response for {}: {}", client_id, e);
        }
    }

    // Forward queued payloads to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let client_id_clone = client_id.clone();
    let state_clone = state.clone();

    loop {
        tokio::select! {
            res = ws_receiver.next() => {
                match res {
                    Some(Ok(Message::Text(text))) => {
                        handle_message(&text, &client_id_clone, &state_clone);
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} sent close frame", client_id_clone);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = data;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error for client {}: {}", client_id_clone, e);
                        break;
                    }
                    None => {
                        info!("WebSocket stream ended for client {}", client_id_clone);
                        break;
                    }
                    _ => {}
                }
            }
            _ = &mut send_task => {
                info!("Send task finished for client {} (likely connection lost)", client_id_clone);
                break;
            }
        }
    }

    send_task.abort();
    state.remove_client(&client_id);
    info!("Client disconnected: {}", client_id);
}

/// Wait for the Connect message from a new connection
async fn wait_for_connect(
    receiver: &mut futures_util::stream::SplitStream<WebSocketStream<TcpStream>>,
) -> Option<String> {
    // Give the client 10 seconds to authenticate
    let timeout = tokio::time::timeout(std::time::Duration::from_secs(10), async {
        while let Some(result) = receiver.next().await {
            if let Ok(Message::Text(text)) = result {
                match serde_json::from_str::<RelayMessage>(&text) {
                    Ok(RelayMessage::Connect { client_id, token }) => {
                        // Shared-token check via environment variable
                        if let Ok(expected_token) = std::env::var("FESTA_RELAY_TOKEN") {
                            if !expected_token.is_empty() {
                                match token {
                                    Some(received) if received == expected_token => {}
                                    Some(_) => {
                                        warn!("Authentication failed for {}: invalid token", client_id);
                                        return None;
                                    }
                                    None => {
                                        warn!("Authentication failed for {}: no token provided", client_id);
                                        return None;
                                    }
                                }
                            }
                        }
                        return Some(client_id);
                    }
                    Ok(_) => {
                        warn!("Expected connect message first");
                    }
                    Err(e) => {
                        warn!("Failed to parse connect message: {}", e);
                    }
                }
            }
        }
        None
    });

    match timeout.await {
        Ok(result) => result,
        Err(_) => {
            warn!("Authentication timeout");
            None
        }
    }
}

/// Handle an incoming message from a connected client
pub fn handle_message(text: &str, client_id: &str, state: &RelayState) {
    let msg: RelayMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("Failed to parse message from {}: {}", client_id, e);
            return;
        }
    };

    match msg {
        RelayMessage::Subscribe { scope } => {
            info!(client = %client_id, ?scope, "subscription added");
            state.subscribe(client_id, scope.clone());
            let ack = RelayMessage::SubAck {
                scope,
                success: true,
            };
            if let Ok(json) = serde_json::to_string(&ack) {
                state.send_to_client(client_id, &json);
            }
        }
        RelayMessage::Publish { row } => {
            let insert = RelayMessage::Insert { row: row.clone() };
            let payload = match serde_json::to_string(&insert) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize insert from {}: {}", client_id, e);
                    return;
                }
            };
            let delivered = state.fan_out(&row, &payload, Some(client_id));
            info!(
                message_id = %row.id,
                thread_id = %row.thread_id,
                delivered,
                "insert fanned out"
            );
        }
        RelayMessage::Connect { .. } => {
            // Already authenticated, ignore
        }
        RelayMessage::AuthResponse { .. }
        | RelayMessage::SubAck { .. }
        | RelayMessage::Insert { .. }
        | RelayMessage::Error { .. } => {
            // Relay-only messages, ignore from clients
        }
    }
}
