// Connection registry and channel fan-out. Inbound messages are matched on
// the typed `ClientMessage` enum in interface_adapters::net::ws rather than
// dispatched through a string-keyed handler table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{info, warn};

use crate::domain::errors::SessionError;
use crate::interface_adapters::protocol::ServerMessage;

/// Per-connection outbound handle kept by the hub. The generation is what
/// lets a displaced connection's teardown race safely against the new
/// connection's registration.
struct Registered {
    username: String,
    generation: u64,
    out_tx: mpsc::Sender<ServerMessage>,
    shutdown: Arc<Notify>,
    channels: HashSet<String>,
}

/// Handle returned to a freshly accepted connection: its outbound message
/// stream and the signal that fires when a newer connection for the same
/// player displaces it.
pub struct ConnHandle {
    pub player_id: String,
    pub generation: u64,
    pub out_rx: mpsc::Receiver<ServerMessage>,
    pub shutdown: Arc<Notify>,
}

/// Outcome of tearing a connection down, telling the caller whether this was
/// the player's *current* session (a real departure) or a stale generation
/// whose socket finally noticed it had been displaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureKind {
    Current,
    Stale,
}

pub struct SessionHub {
    connections: RwLock<HashMap<String, Registered>>,
    channels: RwLock<HashMap<String, HashSet<String>>>,
    next_generation: AtomicU64,
    out_channel_capacity: usize,
}

impl SessionHub {
    pub fn new(out_channel_capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            out_channel_capacity,
        }
    }

    /// Registers a new connection for `player_id`, displacing any existing
    /// one (the displaced connection's `shutdown` is notified so its own
    /// client loop can close gracefully).
    pub async fn accept(&self, player_id: String, username: String) -> ConnHandle {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let (out_tx, out_rx) = mpsc::channel(self.out_channel_capacity);
        let shutdown = Arc::new(Notify::new());

        let mut connections = self.connections.write().await;
        if let Some(previous) = connections.get(&player_id) {
            previous.shutdown.notify_one();
        }
        connections.insert(
            player_id.clone(),
            Registered {
                username,
                generation,
                out_tx,
                shutdown: shutdown.clone(),
                channels: HashSet::new(),
            },
        );

        ConnHandle {
            player_id,
            generation,
            out_rx,
            shutdown,
        }
    }

    /// Tears down the connection identified by `(player_id, generation)`.
    /// Returns `DepartureKind::Stale` if a newer connection already replaced
    /// it — the caller should still release per-connection resources but
    /// must suppress presence/forfeit side effects for a stale departure.
    pub async fn disconnect(&self, player_id: &str, generation: u64) -> DepartureKind {
        let mut connections = self.connections.write().await;
        let is_current = matches!(connections.get(player_id), Some(r) if r.generation == generation);

        if is_current {
            if let Some(registered) = connections.remove(player_id) {
                drop(connections);
                let mut channels = self.channels.write().await;
                for channel in registered.channels {
                    if let Some(members) = channels.get_mut(&channel) {
                        members.remove(player_id);
                    }
                }
            }
            info!(player_id, "session disconnected");
            DepartureKind::Current
        } else {
            DepartureKind::Stale
        }
    }

    pub async fn subscribe(&self, player_id: &str, channel: &str) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.get_mut(player_id) {
            conn.channels.insert(channel.to_string());
        }
        drop(connections);
        self.channels
            .write()
            .await
            .entry(channel.to_string())
            .or_default()
            .insert(player_id.to_string());
    }

    pub async fn unsubscribe(&self, player_id: &str, channel: &str) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.get_mut(player_id) {
            conn.channels.remove(channel);
        }
        drop(connections);
        if let Some(members) = self.channels.write().await.get_mut(channel) {
            members.remove(player_id);
        }
    }

    pub async fn send(&self, player_id: &str, message: ServerMessage) -> Result<(), SessionError> {
        let connections = self.connections.read().await;
        let Some(conn) = connections.get(player_id) else {
            return Err(SessionError::NotConnected(player_id.to_string()));
        };
        match conn.out_tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(player_id, "outbound queue full; dropping message");
                Err(SessionError::Backpressure(player_id.to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SessionError::NotConnected(player_id.to_string())),
        }
    }

    pub async fn broadcast_channel(&self, channel: &str, message: ServerMessage, exclude: Option<&str>) {
        let members: Vec<String> = {
            let channels = self.channels.read().await;
            match channels.get(channel) {
                Some(members) => members.iter().cloned().collect(),
                None => return,
            }
        };
        for player_id in members {
            if Some(player_id.as_str()) == exclude {
                continue;
            }
            let _ = self.send(&player_id, message.clone()).await;
        }
    }

    pub async fn broadcast_all(&self, message: ServerMessage, exclude: Option<&str>) {
        let ids: Vec<String> = self.connections.read().await.keys().cloned().collect();
        for player_id in ids {
            if Some(player_id.as_str()) == exclude {
                continue;
            }
            let _ = self.send(&player_id, message.clone()).await;
        }
    }

    pub async fn is_online(&self, player_id: &str) -> bool {
        self.connections.read().await.contains_key(player_id)
    }

    pub async fn online_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn online_roster(&self, exclude: Option<&str>) -> Vec<String> {
        self.connections
            .read()
            .await
            .keys()
            .filter(|id| Some(id.as_str()) != exclude)
            .cloned()
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn displacement_notifies_old_shutdown_and_bumps_generation() {
        let hub = SessionHub::new(16);
        let first = hub.accept("p1".into(), "alice".into()).await;
        let second = hub.accept("p1".into(), "alice".into()).await;
        assert!(second.generation > first.generation);

        let notified = tokio::time::timeout(std::time::Duration::from_millis(50), first.shutdown.notified()).await;
        assert!(notified.is_ok());
    }

    #[tokio::test]
    async fn disconnect_with_stale_generation_does_not_remove_current_session() {
        let hub = SessionHub::new(16);
        let first = hub.accept("p1".into(), "alice".into()).await;
        let _second = hub.accept("p1".into(), "alice".into()).await;

        let kind = hub.disconnect("p1", first.generation).await;
        assert_eq!(kind, DepartureKind::Stale);
        assert!(hub.is_online("p1").await);
    }

    #[tokio::test]
    async fn disconnect_with_current_generation_removes_session() {
        let hub = SessionHub::new(16);
        let conn = hub.accept("p1".into(), "alice".into()).await;
        let kind = hub.disconnect("p1", conn.generation).await;
        assert_eq!(kind, DepartureKind::Current);
        assert!(!hub.is_online("p1").await);
    }

    #[tokio::test]
    async fn subscribe_then_broadcast_reaches_channel_members_only() {
        let hub = SessionHub::new(16);
        let mut a = hub.accept("a".into(), "alice".into()).await;
        let _b = hub.accept("b".into(), "bob".into()).await;
        hub.subscribe("a", "battle:1").await;

        hub.broadcast_channel("battle:1", ServerMessage::OnlineCount { count: 1 }, None)
            .await;
        let received = a.out_rx.try_recv();
        assert!(received.is_ok());
    }
}
