//! Connection registry for WebSocket clients
//!
//! Tracks live connections per user and per channel. Each connection owns an
//! unbounded queue drained by its socket writer task.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use super::protocol::{project_channel, ProjectUpdate, ServerMessage};
use crate::domain::entities::{Notification, ProjectId, UserId};
use crate::domain::ports::RealtimePublisher;

/// Outbound queue of serialized frames
pub type Outbound = mpsc::UnboundedSender<String>;

struct Connection {
    user_id: UserId,
    sender: Outbound,
    channels: HashSet<String>,
    connected_at: DateTime<Utc>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<String, Connection>,
    by_user: HashMap<UserId, HashSet<String>>,
    by_channel: HashMap<String, HashSet<String>>,
}

impl Registry {
    fn remove(&mut self, connection_id: &str) -> Option<Connection> {
        let conn = self.connections.remove(connection_id)?;

        if let Some(ids) = self.by_user.get_mut(&conn.user_id) {
            ids.remove(connection_id);
            if ids.is_empty() {
                self.by_user.remove(&conn.user_id);
            }
        }
        for channel in &conn.channels {
            if let Some(ids) = self.by_channel.get_mut(channel) {
                ids.remove(connection_id);
                if ids.is_empty() {
                    self.by_channel.remove(channel);
                }
            }
        }
        Some(conn)
    }
}

/// Summary of hub state
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub total_connections: usize,
    pub connected_users: usize,
    pub channels: HashMap<String, usize>,
}

/// One live connection, as reported to managers
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub user_id: UserId,
    pub channels: Vec<String>,
    pub connected_at: DateTime<Utc>,
}

/// Process-wide WebSocket connection manager
#[derive(Default)]
pub struct ConnectionManager {
    registry: RwLock<Registry>,
    seq: AtomicU64,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and greet it with its id
    pub async fn connect(&self, user_id: UserId, sender: Outbound) -> String {
        let now = Utc::now();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let connection_id = format!("{}_{}_{}", user_id, now.timestamp_millis(), seq);

        let greeting = ServerMessage::ConnectionEstablished {
            connection_id: connection_id.clone(),
            timestamp: now,
        };
        let _ = sender.send(greeting.to_json());

        let mut registry = self.registry.write().await;
        registry.connections.insert(
            connection_id.clone(),
            Connection {
                user_id,
                sender,
                channels: HashSet::new(),
                connected_at: now,
            },
        );
        registry
            .by_user
            .entry(user_id)
            .or_default()
            .insert(connection_id.clone());

        tracing::info!(connection_id = %connection_id, user_id = %user_id, "WebSocket connected");
        connection_id
    }

    pub async fn disconnect(&self, connection_id: &str) {
        if self.registry.write().await.remove(connection_id).is_some() {
            tracing::info!(connection_id = %connection_id, "WebSocket disconnected");
        }
    }

    /// Add a channel subscription; false when the connection is unknown
    pub async fn subscribe(&self, connection_id: &str, channel: &str) -> bool {
        let mut registry = self.registry.write().await;
        let Some(conn) = registry.connections.get_mut(connection_id) else {
            return false;
        };
        conn.channels.insert(channel.to_string());
        registry
            .by_channel
            .entry(channel.to_string())
            .or_default()
            .insert(connection_id.to_string());
        true
    }

    pub async fn unsubscribe(&self, connection_id: &str, channel: &str) {
        let mut registry = self.registry.write().await;
        if let Some(conn) = registry.connections.get_mut(connection_id) {
            conn.channels.remove(channel);
        }
        if let Some(ids) = registry.by_channel.get_mut(channel) {
            ids.remove(connection_id);
            if ids.is_empty() {
                registry.by_channel.remove(channel);
            }
        }
    }

    pub async fn channels_of(&self, connection_id: &str) -> Vec<String> {
        let registry = self.registry.read().await;
        let mut channels: Vec<String> = registry
            .connections
            .get(connection_id)
            .map(|c| c.channels.iter().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    pub async fn send_to_connection(&self, connection_id: &str, message: &ServerMessage) -> bool {
        self.deliver(vec![connection_id.to_string()], message.to_json())
            .await
            > 0
    }

    pub async fn send_to_user(&self, user_id: &UserId, message: &ServerMessage) -> usize {
        self.send_to_user_raw(user_id, message.to_json()).await
    }

    /// Send an already serialized frame to every socket of a user
    pub async fn send_to_user_raw(&self, user_id: &UserId, frame: String) -> usize {
        let targets = {
            let registry = self.registry.read().await;
            registry
                .by_user
                .get(user_id)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default()
        };
        self.deliver(targets, frame).await
    }

    pub async fn broadcast_channel(&self, channel: &str, message: &ServerMessage) -> usize {
        self.broadcast_channel_raw(channel, message.to_json()).await
    }

    /// Send an already serialized frame to a channel's subscribers
    pub async fn broadcast_channel_raw(&self, channel: &str, frame: String) -> usize {
        let targets = {
            let registry = self.registry.read().await;
            registry
                .by_channel
                .get(channel)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default()
        };
        self.deliver(targets, frame).await
    }

    /// Send an already serialized frame to every connection
    pub async fn broadcast_all_raw(&self, frame: String) -> usize {
        let targets = {
            let registry = self.registry.read().await;
            registry.connections.keys().cloned().collect()
        };
        self.deliver(targets, frame).await
    }

    pub async fn stats(&self) -> HubStats {
        let registry = self.registry.read().await;
        HubStats {
            total_connections: registry.connections.len(),
            connected_users: registry.by_user.len(),
            channels: registry
                .by_channel
                .iter()
                .map(|(name, ids)| (name.clone(), ids.len()))
                .collect(),
        }
    }

    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let registry = self.registry.read().await;
        let mut infos: Vec<ConnectionInfo> = registry
            .connections
            .iter()
            .map(|(id, conn)| {
                let mut channels: Vec<String> = conn.channels.iter().cloned().collect();
                channels.sort();
                ConnectionInfo {
                    connection_id: id.clone(),
                    user_id: conn.user_id,
                    channels,
                    connected_at: conn.connected_at,
                }
            })
            .collect();
        infos.sort_by_key(|c| c.connected_at);
        infos
    }

    pub async fn is_user_online(&self, user_id: &UserId) -> bool {
        self.registry.read().await.by_user.contains_key(user_id)
    }

    /// Push a frame to each target; connections whose socket is gone are dropped
    async fn deliver(&self, targets: Vec<String>, frame: String) -> usize {
        if targets.is_empty() {
            return 0;
        }

        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let registry = self.registry.read().await;
            for id in targets {
                match registry.connections.get(&id) {
                    Some(conn) if conn.sender.send(frame.clone()).is_ok() => delivered += 1,
                    Some(_) => dead.push(id),
                    None => {}
                }
            }
        }

        if !dead.is_empty() {
            let mut registry = self.registry.write().await;
            for id in dead {
                registry.remove(&id);
                tracing::debug!(connection_id = %id, "Dropped closed connection");
            }
        }
        delivered
    }
}

#[async_trait]
impl RealtimePublisher for ConnectionManager {
    async fn notify_user(&self, user_id: &UserId, notification: &Notification) -> usize {
        let message = ServerMessage::Notification {
            data: notification.clone(),
            timestamp: Utc::now(),
        };
        self.send_to_user(user_id, &message).await
    }

    async fn project_event(
        &self,
        project_id: &ProjectId,
        event: &str,
        data: serde_json::Value,
    ) -> usize {
        let message = ServerMessage::ProjectUpdate {
            data: ProjectUpdate {
                event: event.to_string(),
                project_id: *project_id,
                data,
            },
            timestamp: Utc::now(),
        };
        self.broadcast_channel(&project_channel(project_id), &message)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> UserId {
        UserId(Uuid::new_v4())
    }

    fn frame_type(frame: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(frame).unwrap();
        value["type"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_connect_sends_greeting() {
        let hub = ConnectionManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let uid = user();

        let id = hub.connect(uid, tx).await;
        assert!(id.starts_with(&uid.to_string()));
        assert_eq!(frame_type(&rx.recv().await.unwrap()), "connection_established");
        assert!(hub.is_user_online(&uid).await);
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let hub = ConnectionManager::new();
        let uid = user();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();

        let a = hub.connect(uid, tx1).await;
        let b = hub.connect(uid, tx2).await;
        assert_ne!(a, b);
        assert_eq!(hub.stats().await.connected_users, 1);
        assert_eq!(hub.stats().await.total_connections, 2);
    }

    #[tokio::test]
    async fn test_channel_broadcast_reaches_subscribers_only() {
        let hub = ConnectionManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let a = hub.connect(user(), tx1).await;
        let _b = hub.connect(user(), tx2).await;
        rx1.recv().await;
        rx2.recv().await;

        let project = ProjectId(Uuid::new_v4());
        hub.subscribe(&a, &project_channel(&project)).await;

        let sent = hub
            .project_event(&project, "task_created", serde_json::json!({"id": 1}))
            .await;
        assert_eq!(sent, 1);
        assert_eq!(frame_type(&rx1.recv().await.unwrap()), "project_update");
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_cleans_every_map() {
        let hub = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let uid = user();
        let id = hub.connect(uid, tx).await;
        hub.subscribe(&id, "notifications").await;

        hub.disconnect(&id).await;

        let stats = hub.stats().await;
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.connected_users, 0);
        assert!(stats.channels.is_empty());
    }

    #[tokio::test]
    async fn test_closed_receivers_are_pruned() {
        let hub = ConnectionManager::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let uid = user();
        hub.connect(uid, tx).await;
        drop(rx);

        let sent = hub.send_to_user(&uid, &ServerMessage::error("x")).await;
        assert_eq!(sent, 0);
        assert!(!hub.is_user_online(&uid).await);
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_empty_channel() {
        let hub = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.connect(user(), tx).await;

        hub.subscribe(&id, "chat:abc").await;
        assert_eq!(hub.channels_of(&id).await, vec!["chat:abc".to_string()]);

        hub.unsubscribe(&id, "chat:abc").await;
        assert!(hub.stats().await.channels.is_empty());
    }
}
