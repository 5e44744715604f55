use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::messages::{MessageRow, SubScope};

/// Relay state: connected clients and their subscription scopes.
pub struct RelayState {
    /// client_id -> list of sender channels (supports multiple connections
    /// per client)
    pub clients: DashMap<String, Vec<mpsc::UnboundedSender<String>>>,
    /// client_id -> subscribed scopes
    subscriptions: DashMap<String, Vec<SubScope>>,
}

impl RelayState {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            subscriptions: DashMap::new(),
        }
    }

    /// Register a new client connection.
    pub fn add_client(&self, client_id: String, tx: mpsc::UnboundedSender<String>) {
        self.clients
            .entry(client_id)
            .or_insert_with(Vec::new)
            .push(tx);
    }

    /// Drop closed channels for a client; remove the client entirely (with
    /// its subscriptions) once no connection remains.
    pub fn remove_client(&self, client_id: &str) {
        if let Some(mut entry) = self.clients.get_mut(client_id) {
            entry.retain(|tx| !tx.is_closed());
            if entry.is_empty() {
                drop(entry);
                self.clients.remove(client_id);
                self.subscriptions.remove(client_id);
            }
        }
    }

    /// Add a scope to a client's subscription set (duplicates collapse).
    pub fn subscribe(&self, client_id: &str, scope: SubScope) {
        let mut entry = self
            .subscriptions
            .entry(client_id.to_string())
            .or_insert_with(Vec::new);
        if !entry.contains(&scope) {
            entry.push(scope);
        }
    }

    pub fn subscription_count(&self, client_id: &str) -> usize {
        self.subscriptions
            .get(client_id)
            .map(|scopes| scopes.len())
            .unwrap_or(0)
    }

    /// Send a payload to every connection of one client.
    pub fn send_to_client(&self, client_id: &str, payload: &str) -> bool {
        if let Some(channels) = self.clients.get(client_id) {
            let mut sent = false;
            for tx in channels.iter() {
                if tx.send(payload.to_string()).is_ok() {
                    sent = true;
                }
            }
            sent
        } else {
            false
        }
    }

    /// Fan an inserted row out to every subscriber whose scope matches,
    /// excluding the publisher's own connection.
    pub fn fan_out(&self, row: &MessageRow, payload: &str, exclude_client: Option<&str>) -> usize {
        let mut delivered = 0;
        for entry in self.subscriptions.iter() {
            let client_id = entry.key();
            if Some(client_id.as_str()) == exclude_client {
                continue;
            }
            if entry.value().iter().any(|scope| scope.matches(row)) {
                if self.send_to_client(client_id, payload) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    pub fn connected_clients(&self) -> Vec<String> {
        self.clients
            .iter()
            .filter(|e| !e.value().is_empty())
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn is_connected(&self, client_id: &str) -> bool {
        self.clients
            .get(client_id)
            .map(|channels| !channels.is_empty())
            .unwrap_or(false)
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}
