use crate::broker::registry::ConsumerRegistry;
use crate::protocol::Frame;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Fan-out of published events to the subscribers of their type.
///
/// The `CONSUME` frame is encoded once and its bytes are shared across all
/// subscriber queues. Writes are best-effort: a closed peer is skipped and
/// cleaned out of the registry when its connection task exits.
#[derive(Debug)]
pub struct Publisher {
    registry: Arc<ConsumerRegistry>,
}

impl Publisher {
    pub fn new(registry: Arc<ConsumerRegistry>) -> Self {
        Self { registry }
    }

    pub fn publish(&self, payload: &[u8], kind: u8) {
        let frame = match Frame::consume(payload) {
            Ok(frame) => frame,
            Err(e) => {
                error!("cannot fan out event of type {}: {}", kind, e);
                return;
            }
        };

        let bytes = frame.into_bytes();
        let subscribers = self.registry.connections_for(kind);
        trace!(
            "fanning out {} byte event of type {} to {} subscriber(s)",
            bytes.len(),
            kind,
            subscribers.len()
        );

        for subscriber in subscribers {
            if !subscriber.send(bytes.clone()) {
                debug!(
                    "subscriber {} is gone, skipping delivery of type {}",
                    subscriber.id(),
                    kind
                );
            }
        }
    }
}
