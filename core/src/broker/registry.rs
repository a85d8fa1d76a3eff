use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Write handle to one broker-side connection.
///
/// Frames enqueued here are drained by the connection's writer task, so
/// fan-out to one peer never blocks on another peer's socket.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: u64,
    outbound: mpsc::UnboundedSender<Bytes>,
}

impl Subscriber {
    pub fn new(id: u64, outbound: mpsc::UnboundedSender<Bytes>) -> Self {
        Self { id, outbound }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Enqueue frame bytes for this subscriber. Returns `false` when the
    /// connection is gone.
    pub fn send(&self, frame: Bytes) -> bool {
        self.outbound.send(frame).is_ok()
    }
}

/// Mapping from event type identifier to the connections subscribed to it.
///
/// Shared across all connection handlers; mutations and snapshot reads are
/// guarded by a read-mostly lock.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    subscribers: RwLock<HashMap<u8, Vec<Subscriber>>>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` for `kind`. Idempotent per connection.
    pub fn add(&self, kind: u8, subscriber: Subscriber) {
        let mut subscribers = self.subscribers.write();
        let entries = subscribers.entry(kind).or_default();
        if !entries.iter().any(|s| s.id == subscriber.id) {
            entries.push(subscriber);
        }
    }

    /// Snapshot of the current subscribers for `kind`.
    pub fn connections_for(&self, kind: u8) -> Vec<Subscriber> {
        self.subscribers
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove the connection from every type's subscriber set. Called on
    /// disconnect so no frame is ever enqueued for a dead socket.
    pub fn remove_all(&self, connection_id: u64) {
        let mut subscribers = self.subscribers.write();
        for entries in subscribers.values_mut() {
            entries.retain(|s| s.id != connection_id);
        }
        subscribers.retain(|_, entries| !entries.is_empty());
    }

    pub fn subscriber_count(&self, kind: u8) -> usize {
        self.subscribers
            .read()
            .get(&kind)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}
