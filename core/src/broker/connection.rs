use crate::broker::publisher::Publisher;
use crate::broker::registry::{ConsumerRegistry, Subscriber};
use crate::protocol::{Frame, FrameCodec, FrameType};
use crate::storage::EventLog;
use crate::Result;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

/// Per-socket broker state.
///
/// A connection accepts only `REGISTER_CONSUMERS` until it has registered,
/// then only `PUBLISH`. Everything else is discarded without closing the
/// socket. The closed state is the connection task exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    AwaitingRegistration,
    Active,
}

struct ConnectionHandler {
    id: u64,
    state: ConnectionState,
    log: Arc<dyn EventLog>,
    registry: Arc<ConsumerRegistry>,
    publisher: Arc<Publisher>,
    outbound: mpsc::UnboundedSender<Bytes>,
}

/// Drive one accepted socket until it closes.
///
/// Inbound bytes are framed on this task; log appends and replay reads run
/// on the blocking pool. Frames are processed strictly in arrival order.
pub(crate) async fn run(
    stream: TcpStream,
    id: u64,
    log: Arc<dyn EventLog>,
    registry: Arc<ConsumerRegistry>,
    publisher: Arc<Publisher>,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let (read_half, mut write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, FrameCodec::new());

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
    let writer = tokio::spawn(async move {
        while let Some(bytes) = outbound_rx.recv().await {
            if let Err(e) = write_half.write_all(&bytes).await {
                debug!("outbound write failed, dropping writer: {}", e);
                break;
            }
        }
    });

    let mut handler = ConnectionHandler {
        id,
        state: ConnectionState::AwaitingRegistration,
        log,
        registry: Arc::clone(&registry),
        publisher,
        outbound: outbound_tx,
    };

    let result = loop {
        match frames.next().await {
            Some(Ok(frame)) => handler.handle_frame(frame).await,
            Some(Err(e)) => break Err(crate::RelaymqError::Network(e.to_string())),
            None => break Ok(()),
        }
    };

    registry.remove_all(id);
    drop(handler);
    writer.abort();
    result
}

impl ConnectionHandler {
    async fn handle_frame(&mut self, frame: Frame) {
        match (self.state, frame.frame_type()) {
            (ConnectionState::AwaitingRegistration, Some(FrameType::RegisterConsumers)) => {
                self.handle_registration(frame).await;
            }
            (ConnectionState::AwaitingRegistration, _) => {
                debug!(
                    "connection {}: discarding frame received before registration",
                    self.id
                );
            }
            (ConnectionState::Active, Some(FrameType::Publish)) => {
                self.handle_publish(frame).await;
            }
            (ConnectionState::Active, Some(FrameType::RegisterConsumers)) => {
                debug!(
                    "connection {}: already registered, ignoring re-registration",
                    self.id
                );
            }
            (ConnectionState::Active, _) => {
                debug!("connection {}: discarding unexpected frame", self.id);
            }
        }
    }

    async fn handle_registration(&mut self, frame: Frame) {
        self.state = ConnectionState::Active;

        let replay = frame.replay_requested();
        let payload = frame.payload();

        let mut kinds: Vec<u8> = Vec::new();
        for &kind in payload.iter() {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }

        info!(
            "connection {}: registered for {} event type(s), replay={}",
            self.id,
            kinds.len(),
            replay
        );

        for kind in kinds {
            // Replay is enqueued before the connection joins the subscriber
            // set, so stored history always precedes live events of the same
            // type on this socket.
            if replay {
                self.replay_kind(kind).await;
            }
            self.registry
                .add(kind, Subscriber::new(self.id, self.outbound.clone()));
        }
    }

    async fn replay_kind(&self, kind: u8) {
        let log = Arc::clone(&self.log);
        let events = match task::spawn_blocking(move || log.list_ascending(kind)).await {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                // abort replay for this type only; remaining types proceed
                error!(
                    "connection {}: replay read for type {} failed: {}",
                    self.id, kind, e
                );
                return;
            }
            Err(e) => {
                error!(
                    "connection {}: replay task for type {} panicked: {}",
                    self.id, kind, e
                );
                return;
            }
        };

        debug!(
            "connection {}: replaying {} stored event(s) of type {}",
            self.id,
            events.len(),
            kind
        );

        for payload in events {
            match Frame::consume(&payload) {
                Ok(frame) => {
                    if self.outbound.send(frame.into_bytes()).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(
                        "connection {}: skipping unreplayable event of type {}: {}",
                        self.id, kind, e
                    );
                }
            }
        }
    }

    async fn handle_publish(&self, frame: Frame) {
        let payload = frame.payload();
        if payload.is_empty() {
            warn!(
                "connection {}: discarding PUBLISH frame with empty payload",
                self.id
            );
            return;
        }

        let kind = payload[0];
        let log = Arc::clone(&self.log);
        let stored = payload.clone();

        match task::spawn_blocking(move || log.append(kind, &stored)).await {
            Ok(Ok(())) => self.publisher.publish(&payload, kind),
            Ok(Err(e)) => {
                // the event is not forwarded; no acknowledgement channel
                // exists to notify the producer
                error!(
                    "connection {}: failed to append event of type {}: {}",
                    self.id, kind, e
                );
            }
            Err(e) => {
                error!(
                    "connection {}: append task for type {} panicked: {}",
                    self.id, kind, e
                );
            }
        }
    }
}
