//! WebSocket connection manager.
//!
//! Tracks every live queue subscriber and fans job-list snapshots out to
//! them. It is registered as the job store's [`ChangeNotifier`], so fan-out
//! runs on the caller's thread and never blocks: a subscriber whose channel
//! is full or closed is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::debug;

use super::messages::ServerMessage;
use crate::print_queue::{ChangeNotifier, PrintJob};

const CHANNEL_CAPACITY: usize = 32;

pub type ConnectionId = u64;

/// Error type for send operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SendError {
    /// The target connection is not registered.
    NotConnected,
    /// The connection channel is closed or full.
    Disconnected,
}

pub struct ConnectionManager {
    next_id: AtomicU64,
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<ServerMessage>>>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the connection id and a receiver for outgoing messages. The
    /// caller forwards messages from the receiver to the socket.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        (id, rx)
    }

    pub fn unregister(&self, id: ConnectionId) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Queue a message for one connection.
    pub fn send_to(&self, id: ConnectionId, message: ServerMessage) -> Result<(), SendError> {
        let conns = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let sender = conns.get(&id).ok_or(SendError::NotConnected)?;
        sender
            .try_send(message)
            .map_err(|_| SendError::Disconnected)
    }

    /// Queue a message for every connection.
    ///
    /// Connections that cannot take the message are unregistered; their
    /// forwarding task ends once the sender is dropped. Returns the ids
    /// that were dropped.
    pub fn broadcast(&self, message: ServerMessage) -> Vec<ConnectionId> {
        let failed: Vec<ConnectionId> = {
            let conns = self
                .connections
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            conns
                .iter()
                .filter(|(_, sender)| sender.try_send(message.clone()).is_err())
                .map(|(id, _)| *id)
                .collect()
        };

        if !failed.is_empty() {
            let mut conns = self
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for id in &failed {
                debug!("Dropping unresponsive WebSocket subscriber {}", id);
                conns.remove(id);
            }
        }
        failed
    }

    pub fn connection_count(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ChangeNotifier for ConnectionManager {
    fn jobs_changed(&self, jobs: &[PrintJob]) {
        self.broadcast(ServerMessage::queue_update(jobs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_creates_valid_receiver() {
        let manager = ConnectionManager::new();
        let (id, mut rx) = manager.register();

        manager.send_to(id, ServerMessage::empty("test")).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.msg_type, "test");
    }

    #[test]
    fn ids_are_unique() {
        let manager = ConnectionManager::new();
        let (a, _rx_a) = manager.register();
        let (b, _rx_b) = manager.register();
        assert_ne!(a, b);
        assert_eq!(manager.connection_count(), 2);
    }

    #[test]
    fn unregister_removes_connection() {
        let manager = ConnectionManager::new();
        let (id, _rx) = manager.register();
        manager.unregister(id);

        assert_eq!(manager.connection_count(), 0);
        assert_eq!(
            manager.send_to(id, ServerMessage::empty("test")),
            Err(SendError::NotConnected)
        );
    }

    #[tokio::test]
    async fn jobs_changed_reaches_every_subscriber() {
        let manager = ConnectionManager::new();
        let (_, mut rx1) = manager.register();
        let (_, mut rx2) = manager.register();

        let job = PrintJob::new("a.pdf", "", "", "");
        manager.jobs_changed(std::slice::from_ref(&job));

        for rx in [&mut rx1, &mut rx2] {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.msg_type, "queue_update");
            assert_eq!(msg.payload[0]["id"], job.id.as_str());
        }
    }

    #[test]
    fn broadcast_drops_closed_connections() {
        let manager = ConnectionManager::new();
        let (_keep, _rx1) = manager.register();
        let (gone, rx2) = manager.register();
        drop(rx2);

        let failed = manager.broadcast(ServerMessage::empty("sync"));

        assert_eq!(failed, vec![gone]);
        assert_eq!(manager.connection_count(), 1);
    }

    #[test]
    fn broadcast_drops_full_connections() {
        let manager = ConnectionManager::new();
        let (slow, _rx) = manager.register();

        for _ in 0..CHANNEL_CAPACITY {
            assert!(manager.broadcast(ServerMessage::empty("tick")).is_empty());
        }
        assert_eq!(manager.broadcast(ServerMessage::empty("tick")), vec![slow]);
        assert_eq!(manager.connection_count(), 0);
    }
}
