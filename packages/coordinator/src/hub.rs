use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::models::ServerEvent;

/// Identifies one live socket for the lifetime of its connection.
pub type ConnectionId = Uuid;

/// Message handed to a connection's writer task.
#[derive(Debug, Clone)]
pub enum HubMessage {
    /// A serialized outbound event frame.
    Event(String),
    /// Instructs the writer to close the socket.
    Close,
}

struct ConnectionHandle {
    sender: mpsc::UnboundedSender<HubMessage>,
    topics: HashSet<String>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    topics: HashMap<String, HashSet<ConnectionId>>,
}

/// Topic-based fan-out registry over live connections.
///
/// Owns every topic-membership mapping in the process; callers only go
/// through join/leave/emit and the bulk move used at match commit.
/// Senders are unbounded, so no lock is ever held across an await.
pub struct ConnectionHub {
    registry: RwLock<Registry>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        ConnectionHub {
            registry: RwLock::new(Registry::default()),
        }
    }

    fn write(&self) -> RwLockWriteGuard<Registry> {
        self.registry.write().expect("connection hub lock poisoned")
    }

    pub fn register(&self, sender: mpsc::UnboundedSender<HubMessage>) -> ConnectionId {
        let connection_id = Uuid::new_v4();
        self.write().connections.insert(
            connection_id,
            ConnectionHandle {
                sender,
                topics: HashSet::new(),
            },
        );
        connection_id
    }

    /// Drops the connection and its memberships. Emits to the connection
    /// after this are silently lost.
    pub fn unregister(&self, connection_id: ConnectionId) {
        let mut registry = self.write();
        if let Some(handle) = registry.connections.remove(&connection_id) {
            for topic in handle.topics {
                if let Some(members) = registry.topics.get_mut(&topic) {
                    members.remove(&connection_id);
                    if members.is_empty() {
                        registry.topics.remove(&topic);
                    }
                }
            }
        }
    }

    pub fn join(&self, connection_id: ConnectionId, topic: &str) {
        let mut registry = self.write();
        if let Some(handle) = registry.connections.get_mut(&connection_id) {
            handle.topics.insert(topic.to_string());
            registry
                .topics
                .entry(topic.to_string())
                .or_default()
                .insert(connection_id);
        }
    }

    pub fn leave(&self, connection_id: ConnectionId, topic: &str) {
        let mut registry = self.write();
        if let Some(handle) = registry.connections.get_mut(&connection_id) {
            handle.topics.remove(topic);
        }
        if let Some(members) = registry.topics.get_mut(topic) {
            members.remove(&connection_id);
            if members.is_empty() {
                registry.topics.remove(topic);
            }
        }
    }

    /// Fans the event out to every current member of the topic.
    pub fn emit(&self, topic: &str, event: &ServerEvent) {
        let Some(frame) = serialize(event) else {
            return;
        };
        let registry = self.registry.read().expect("connection hub lock poisoned");
        let Some(members) = registry.topics.get(topic) else {
            return;
        };
        for connection_id in members {
            if let Some(handle) = registry.connections.get(connection_id) {
                let _ = handle.sender.send(HubMessage::Event(frame.clone()));
            }
        }
    }

    pub fn emit_to(&self, connection_id: ConnectionId, event: &ServerEvent) {
        let Some(frame) = serialize(event) else {
            return;
        };
        let registry = self.registry.read().expect("connection hub lock poisoned");
        if let Some(handle) = registry.connections.get(&connection_id) {
            let _ = handle.sender.send(HubMessage::Event(frame));
        }
    }

    /// Sends the event to every member of the topic and orders their
    /// sockets closed. Returns how many connections were told to go.
    pub fn kick_members(&self, topic: &str, event: &ServerEvent) -> usize {
        let Some(frame) = serialize(event) else {
            return 0;
        };
        let registry = self.registry.read().expect("connection hub lock poisoned");
        let Some(members) = registry.topics.get(topic) else {
            return 0;
        };
        let mut kicked = 0;
        for connection_id in members {
            if let Some(handle) = registry.connections.get(connection_id) {
                let _ = handle.sender.send(HubMessage::Event(frame.clone()));
                let _ = handle.sender.send(HubMessage::Close);
                kicked += 1;
            }
        }
        kicked
    }

    /// Moves every member of `from` into `to` and dissolves `from`.
    pub fn move_members(&self, from: &str, to: &str) {
        let mut registry = self.write();
        let Some(members) = registry.topics.remove(from) else {
            return;
        };
        for connection_id in &members {
            if let Some(handle) = registry.connections.get_mut(connection_id) {
                handle.topics.remove(from);
                handle.topics.insert(to.to_string());
            }
        }
        registry
            .topics
            .entry(to.to_string())
            .or_default()
            .extend(members);
    }

    pub fn member_count(&self, topic: &str) -> usize {
        self.registry
            .read()
            .expect("connection hub lock poisoned")
            .topics
            .get(topic)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}

fn serialize(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!("Failed to serialize outbound event: {}", err);
            None
        }
    }
}
