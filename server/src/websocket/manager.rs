//! WebSocket connection manager.
//!
//! Tracks active WebSocket connections per user and fans generation events
//! out to them.

use std::sync::Arc;

use dashmap::DashMap;
use genwave_engine::Message;
use tokio::sync::mpsc;

use super::ConnectionStats;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<Message>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: String,
    /// User the connection belongs to
    pub user_id: String,
    /// Channel to send messages to this connection
    pub sender: MessageSender,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// All active connections, keyed by connection ID.
    connections: DashMap<String, Connection>,
    /// Index of connections by user_id for efficient lookup.
    by_user_id: DashMap<String, Vec<String>>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            by_user_id: DashMap::new(),
        }
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection.
    ///
    /// Returns the connection ID.
    pub fn register(&self, user_id: String, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        let connection = Connection {
            id: conn_id.clone(),
            user_id: user_id.clone(),
            sender,
        };

        self.connections.insert(conn_id.clone(), connection);
        self.by_user_id
            .entry(user_id.clone())
            .or_default()
            .push(conn_id.clone());

        tracing::info!(conn_id = %conn_id, user_id = %user_id, "WebSocket connection registered");

        conn_id
    }

    /// Unregister a connection.
    pub fn unregister(&self, conn_id: &str) {
        if let Some((_, conn)) = self.connections.remove(conn_id) {
            if let Some(mut conn_ids) = self.by_user_id.get_mut(&conn.user_id) {
                conn_ids.retain(|id| id != conn_id);
                // Clean up empty entries
                if conn_ids.is_empty() {
                    drop(conn_ids);
                    self.by_user_id.remove(&conn.user_id);
                }
            }

            tracing::info!(conn_id = %conn_id, user_id = %conn.user_id, "WebSocket connection unregistered");
        }
    }

    /// Send a message to every connection of one user.
    ///
    /// Returns the number of connections that received the message.
    pub fn send_to_user(&self, user_id: &str, message: Message) -> usize {
        let conn_ids = match self.by_user_id.get(user_id) {
            Some(ids) => ids.clone(),
            None => {
                tracing::debug!(user_id = %user_id, kind = %message.kind(), "No connections for user");
                return 0;
            }
        };

        let mut sent_count = 0;
        for conn_id in conn_ids {
            if let Some(conn) = self.connections.get(&conn_id) {
                if conn.sender.send(message.clone()).is_ok() {
                    sent_count += 1;
                } else {
                    tracing::warn!(conn_id = %conn_id, user_id = %user_id, "Failed to queue message");
                }
            }
        }

        tracing::debug!(
            user_id = %user_id,
            kind = %message.kind(),
            recipients = sent_count,
            "Sent message to user"
        );

        sent_count
    }

    /// Broadcast a message to all connections.
    ///
    /// Returns the number of connections that received the message.
    pub fn broadcast_all(&self, message: Message) -> usize {
        let mut sent_count = 0;

        for entry in self.connections.iter() {
            if entry.value().sender.send(message.clone()).is_ok() {
                sent_count += 1;
            }
        }

        tracing::debug!(kind = %message.kind(), recipients = sent_count, "Broadcast message");

        sent_count
    }

    /// Drop every connection. Their send tasks close the sockets.
    ///
    /// Returns the number of connections dropped.
    pub fn disconnect_all(&self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        self.by_user_id.clear();

        tracing::info!(connections = count, "Disconnected all WebSocket clients");
        count
    }

    /// Get the number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of unique users connected.
    pub fn user_count(&self) -> usize {
        self.by_user_id.len()
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            connections: self.connection_count(),
            users: self.user_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genwave_engine::JobId;

    fn progress() -> Message {
        Message::GenerationProgress {
            id: Some(JobId::Number(7)),
            progress: 50.0,
            stage: "render".to_string(),
            eta: 10.0,
        }
    }

    #[test]
    fn test_register_unregister() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let conn_id = manager.register("user-1".to_string(), tx);
        assert_eq!(manager.connection_count(), 1);
        assert_eq!(manager.user_count(), 1);

        manager.unregister(&conn_id);
        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.user_count(), 0);
    }

    #[test]
    fn test_send_to_user_reaches_only_that_user() {
        let manager = ConnectionManager::new();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();

        manager.register("user-1".to_string(), tx1);
        manager.register("user-1".to_string(), tx2);
        manager.register("user-2".to_string(), tx3);
        assert_eq!(manager.user_count(), 2);

        let sent = manager.send_to_user("user-1", progress());
        assert_eq!(sent, 2);

        assert_eq!(rx1.try_recv().unwrap(), progress());
        assert_eq!(rx2.try_recv().unwrap(), progress());
        assert!(rx3.try_recv().is_err());

        assert_eq!(manager.send_to_user("nobody", progress()), 0);
    }

    #[test]
    fn test_broadcast_all() {
        let manager = ConnectionManager::new();

        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        manager.register("user-1".to_string(), tx1);
        manager.register("user-2".to_string(), tx2);

        assert_eq!(manager.broadcast_all(progress()), 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_closed_receiver_is_not_counted() {
        let manager = ConnectionManager::new();
        let (tx, rx) = mpsc::unbounded_channel();
        manager.register("user-1".to_string(), tx);
        drop(rx);

        assert_eq!(manager.send_to_user("user-1", progress()), 0);
    }

    #[test]
    fn test_disconnect_all_closes_channels() {
        let manager = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        manager.register("user-1".to_string(), tx);

        assert_eq!(manager.disconnect_all(), 1);
        assert_eq!(manager.stats(), ConnectionStats { connections: 0, users: 0 });
        // Sender dropped with the connection
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
