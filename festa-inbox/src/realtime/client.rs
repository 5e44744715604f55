use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::events::{MessageInsert, RelayMessage, SubScope};

/// Relay URL: build-time env, then runtime env, then default
const DEFAULT_RELAY_URL: &str = "ws://localhost:9210";

/// Delay before reconnecting after a dropped connection. Polling bounds
/// staleness while the subscription is down.
const RECONNECT_DELAY_SECS: u64 = 3;

/// WebSocket client that subscribes to message-insert feeds on the relay.
///
/// Scopes are re-subscribed on every (re)connect; inserts are forwarded over
/// an unbounded channel to the sync engine.
pub struct RealtimeClient {
    relay_url: Arc<TokioMutex<String>>,
    connected: Arc<TokioMutex<bool>>,
    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for RealtimeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeClient {
    pub fn new() -> Self {
        let build_time_url = option_env!("FESTA_RELAY_URL");
        let runtime_url = std::env::var("FESTA_RELAY_URL").ok();

        let relay_url = build_time_url
            .map(String::from)
            .or(runtime_url)
            .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());

        info!(url = %relay_url, "Using relay URL");

        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            relay_url: Arc::new(TokioMutex::new(relay_url)),
            connected: Arc::new(TokioMutex::new(false)),
            shutdown_tx,
        }
    }

    pub fn with_url(url: &str) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            relay_url: Arc::new(TokioMutex::new(url.to_string())),
            connected: Arc::new(TokioMutex::new(false)),
            shutdown_tx,
        }
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.lock().await
    }

    /// Connect to the relay and keep the subscription alive, forwarding
    /// insert rows to `inserts_tx`. Reconnects after a fixed delay until
    /// `disconnect` is called.
    pub async fn connect(
        &self,
        client_id: &str,
        scopes: Vec<SubScope>,
        inserts_tx: mpsc::UnboundedSender<MessageInsert>,
    ) {
        let relay_url = self.relay_url.lock().await.clone();
        let client_id = client_id.to_string();
        let connected = self.connected.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let token = std::env::var("FESTA_RELAY_TOKEN").ok();

        tokio::spawn(async move {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    info!("Shutdown signal received, stopping reconnection");
                    break;
                }

                info!(url = %relay_url, "Connecting to relay");

                match connect_async(relay_url.as_str()).await {
                    Ok((ws_stream, _)) => {
                        info!("Connected to relay");
                        *connected.lock().await = true;

                        let (mut ws_write, mut ws_read) = ws_stream.split();

                        let connect_msg = RelayMessage::Connect {
                            client_id: client_id.clone(),
                            token: token.clone(),
                        };
                        let connect_json = match serde_json::to_string(&connect_msg) {
                            Ok(json) => json,
                            Err(e) => {
                                error!(error = %e, "Failed to serialize connect message");
                                break;
                            }
                        };

                        if ws_write.send(Message::Text(connect_json.into())).await.is_err() {
                            error!("Failed to send connect message");
                            *connected.lock().await = false;
                            tokio::time::sleep(tokio::time::Duration::from_secs(
                                RECONNECT_DELAY_SECS,
                            ))
                            .await;
                            continue;
                        }

                        // Wait for auth response
                        let mut authed = false;
                        if let Some(Ok(Message::Text(response))) = ws_read.next().await {
                            if let Ok(RelayMessage::AuthResponse { success, message }) =
                                serde_json::from_str::<RelayMessage>(&response)
                            {
                                if success {
                                    info!("Authenticated with relay: {}", message);
                                    authed = true;
                                } else {
                                    error!("Relay authentication failed: {}", message);
                                }
                            } else {
                                warn!("Unexpected response during auth");
                            }
                        }

                        if !authed {
                            *connected.lock().await = false;
                            tokio::time::sleep(tokio::time::Duration::from_secs(
                                RECONNECT_DELAY_SECS,
                            ))
                            .await;
                            continue;
                        }

                        // (Re-)subscribe every scope on each connect
                        let mut subscribed = true;
                        for scope in &scopes {
                            let subscribe = RelayMessage::Subscribe {
                                scope: scope.clone(),
                            };
                            let json = match serde_json::to_string(&subscribe) {
                                Ok(json) => json,
                                Err(e) => {
                                    error!(error = %e, "Failed to serialize subscribe");
                                    subscribed = false;
                                    break;
                                }
                            };
                            if ws_write.send(Message::Text(json.into())).await.is_err() {
                                error!("Failed to send subscribe");
                                subscribed = false;
                                break;
                            }
                        }
                        if !subscribed {
                            *connected.lock().await = false;
                            tokio::time::sleep(tokio::time::Duration::from_secs(
                                RECONNECT_DELAY_SECS,
                            ))
                            .await;
                            continue;
                        }

                        // Read loop
                        loop {
                            tokio::select! {
                                _ = shutdown_rx.recv() => {
                                    info!("Shutdown signal received, closing subscription");
                                    if let Err(e) = ws_write.send(Message::Close(None)).await {
                                        warn!(error = %e, "Failed to send close frame");
                                    }
                                    *connected.lock().await = false;
                                    return;
                                }
                                msg = ws_read.next() => {
                                    match msg {
                                        Some(Ok(Message::Text(text))) => {
                                            match serde_json::from_str::<RelayMessage>(&text) {
                                                Ok(RelayMessage::Insert { row }) => {
                                                    if inserts_tx.send(row).is_err() {
                                                        info!("Insert receiver dropped, closing");
                                                        *connected.lock().await = false;
                                                        return;
                                                    }
                                                }
                                                Ok(RelayMessage::SubAck { success, .. }) => {
                                                    debug!(success, "Subscription acknowledged");
                                                }
                                                Ok(RelayMessage::Error { message }) => {
                                                    warn!(%message, "Relay reported error");
                                                }
                                                Ok(_) => {}
                                                Err(e) => {
                                                    warn!(error = %e, "Failed to parse relay message");
                                                }
                                            }
                                        }
                                        Some(Ok(Message::Close(_))) | None => {
                                            info!("Relay closed connection");
                                            break;
                                        }
                                        Some(Err(e)) => {
                                            error!(error = %e, "WebSocket error");
                                            break;
                                        }
                                        _ => {}
                                    }
                                }
                            }
                        }

                        *connected.lock().await = false;
                        info!("Disconnected from relay");
                    }
                    Err(e) => {
                        error!(error = %e, url = %relay_url, "Failed to connect to relay");
                    }
                }

                debug!("Reconnecting in {} seconds", RECONNECT_DELAY_SECS);
                tokio::time::sleep(tokio::time::Duration::from_secs(RECONNECT_DELAY_SECS)).await;
            }
        });
    }

    /// Stop the reconnect loop and close the current connection.
    pub fn disconnect(&self) {
        info!("Initiating relay disconnect");
        let _ = self.shutdown_tx.send(());
    }
}
