//! Registry translating incoming event payloads into typed handler calls.

use crate::error::ClientError;
use crate::events::DomainEvent;
use bytes::Bytes;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, warn};

type Decoder = Box<dyn Fn(&[u8]) -> Result<Box<dyn Any + Send>, ClientError> + Send + Sync>;
type Handler = Box<dyn Fn(&(dyn Any + Send)) + Send + Sync>;

struct KindSlot {
    decoder: Decoder,
    handlers: Vec<Handler>,
}

/// A set of event handlers plus the decoders needed to feed them.
///
/// Each registration wires one event kind to one handler; registering the
/// same kind again appends to its handler list. An incoming payload is
/// decoded once and every handler for its kind is invoked with the decoded
/// event. A panicking handler is logged and does not stop the others.
#[derive(Default)]
pub struct EventReceiver {
    /// Registered kind bytes in registration order.
    kinds: Vec<u8>,
    slots: HashMap<u8, KindSlot>,
}

impl EventReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire `handler` to incoming events of kind `E::KIND`.
    pub fn register<E, F>(&mut self, handler: F) -> &mut Self
    where
        E: DomainEvent,
        F: Fn(E) + Send + Sync + 'static,
    {
        let kind = E::KIND.as_byte();

        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }

        let slot = self.slots.entry(kind).or_insert_with(|| KindSlot {
            decoder: Box::new(|body: &[u8]| {
                let mut buf = Bytes::copy_from_slice(body);
                let event = E::decode_body(&mut buf)?;
                Ok(Box::new(event) as Box<dyn Any + Send>)
            }),
            handlers: Vec::new(),
        });

        slot.handlers.push(Box::new(move |event: &(dyn Any + Send)| {
            if let Some(event) = event.downcast_ref::<E>() {
                handler(event.clone());
            }
        }));

        self
    }

    /// Does this receiver handle events of the given kind byte?
    pub fn handles(&self, kind: u8) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Every registered kind byte, in registration order. Feeds the
    /// `REGISTER_CONSUMERS` payload.
    pub fn event_kinds(&self) -> &[u8] {
        &self.kinds
    }

    /// Decode a full event payload (kind byte plus body) and invoke every
    /// handler registered for its kind.
    pub fn dispatch(&self, payload: &[u8]) {
        if payload.len() <= 1 {
            warn!("ignoring event payload without a body");
            return;
        }

        let kind = payload[0];
        let Some(slot) = self.slots.get(&kind) else {
            debug!("no handler registered for event type {}", kind);
            return;
        };

        let event = match (slot.decoder)(&payload[1..]) {
            Ok(event) => event,
            Err(e) => {
                warn!("dropping undecodable event of type {}: {}", kind, e);
                return;
            }
        };

        for handler in &slot.handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event.as_ref()))).is_err() {
                error!("handler for event type {} panicked", kind);
            }
        }
    }
}

impl std::fmt::Debug for EventReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReceiver")
            .field("kinds", &self.kinds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BookingCancelled, RoomBooked};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    fn booking_cancelled() -> BookingCancelled {
        BookingCancelled {
            cancelled_at_ms: 77,
            booking_id: Uuid::new_v4(),
            room_number: 4,
        }
    }

    #[test]
    fn dispatch_invokes_matching_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let mut receiver = EventReceiver::new();
        receiver.register(move |event: BookingCancelled| {
            seen_clone.lock().unwrap().push(event.room_number);
        });

        assert!(receiver.handles(1));
        assert!(!receiver.handles(0));
        assert_eq!(receiver.event_kinds(), &[1]);

        receiver.dispatch(&booking_cancelled().encode());
        assert_eq!(*seen.lock().unwrap(), vec![4]);
    }

    #[test]
    fn duplicate_registrations_all_fire() {
        let count = Arc::new(AtomicUsize::new(0));

        let mut receiver = EventReceiver::new();
        for _ in 0..2 {
            let count = Arc::clone(&count);
            receiver.register(move |_: BookingCancelled| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(receiver.event_kinds(), &[1]);
        receiver.dispatch(&booking_cancelled().encode());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_handler_does_not_stop_the_rest() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let mut receiver = EventReceiver::new();
        receiver.register(|_: BookingCancelled| panic!("boom"));
        receiver.register(move |_: BookingCancelled| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        receiver.dispatch(&booking_cancelled().encode());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_kind_and_garbage_are_ignored() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let mut receiver = EventReceiver::new();
        receiver.register(move |_: RoomBooked| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // unregistered kind
        receiver.dispatch(&booking_cancelled().encode());
        // kind byte with no body
        receiver.dispatch(&[0]);
        // registered kind with an undecodable body
        receiver.dispatch(&[0, 0xDE, 0xAD]);

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn registration_order_is_preserved() {
        let mut receiver = EventReceiver::new();
        receiver.register(|_: BookingCancelled| {});
        receiver.register(|_: RoomBooked| {});
        receiver.register(|_: BookingCancelled| {});

        assert_eq!(receiver.event_kinds(), &[1, 0]);
    }
}
