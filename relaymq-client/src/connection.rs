//! The client side of one broker connection.

use crate::error::ClientError;
use crate::events::DomainEvent;
use crate::receiver::EventReceiver;
use bytes::Bytes;
use futures::StreamExt;
use relaymq::protocol::{Frame, FrameCodec, FrameType};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// An established connection to the broker.
///
/// Owns the socket through a reader task (splitting inbound bytes into
/// frames and dispatching `CONSUME` payloads to the receivers) and a writer
/// task draining an outbound frame queue. Dropping the connection closes
/// the outbound queue and, with it, the socket.
#[derive(Debug)]
pub struct ClientConnection {
    outbound: mpsc::UnboundedSender<Bytes>,
}

impl ClientConnection {
    /// Take ownership of a connected socket, send the registration frame
    /// and start the receive loop.
    ///
    /// The registration payload is the union of every receiver's event
    /// kinds; `request_replay` sets the replay flag so the broker streams
    /// stored history before live events.
    pub fn establish(
        stream: TcpStream,
        request_replay: bool,
        receivers: Vec<EventReceiver>,
    ) -> Result<Self, ClientError> {
        let mut kinds: Vec<u8> = Vec::new();
        for receiver in &receivers {
            for &kind in receiver.event_kinds() {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }

        let registration = Frame::register_consumers(&kinds, request_replay)?;
        info!(
            "registering for {} event type(s), replay={}",
            kinds.len(),
            request_replay
        );

        stream.set_nodelay(true)?;
        let (read_half, mut write_half) = stream.into_split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
        // queued before any publish can reach the channel, so registration
        // is always the first frame on the wire
        let _ = outbound_tx.send(registration.into_bytes());

        tokio::spawn(async move {
            while let Some(bytes) = outbound_rx.recv().await {
                if let Err(e) = write_half.write_all(&bytes).await {
                    debug!("write to broker failed: {}", e);
                    break;
                }
            }
        });

        let receivers = Arc::new(receivers);
        tokio::spawn(async move {
            let mut frames = FramedRead::new(read_half, FrameCodec::new());
            loop {
                match frames.next().await {
                    Some(Ok(frame)) => Self::process_frame(&receivers, frame),
                    Some(Err(e)) => {
                        warn!("broker connection read failed: {}", e);
                        break;
                    }
                    None => {
                        info!("broker closed the connection");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            outbound: outbound_tx,
        })
    }

    fn process_frame(receivers: &Arc<Vec<EventReceiver>>, frame: Frame) {
        if frame.frame_type() != Some(FrameType::Consume) {
            debug!("ignoring non-CONSUME frame from broker");
            return;
        }

        let payload = frame.payload();
        if payload.is_empty() {
            warn!("discarding CONSUME frame with empty payload");
            return;
        }
        if payload.len() <= 1 {
            warn!("discarding CONSUME payload without event body");
            return;
        }

        let kind = payload[0];
        let Some(index) = receivers.iter().position(|r| r.handles(kind)) else {
            warn!("no receiver registered for event type {}", kind);
            return;
        };

        // handler work runs off the I/O task so a slow handler cannot stall
        // the receive loop
        let receivers = Arc::clone(receivers);
        task::spawn_blocking(move || receivers[index].dispatch(&payload));
    }

    /// Serialize `event` and send it as a `PUBLISH` frame.
    pub fn publish<E: DomainEvent>(&self, event: &E) -> Result<(), ClientError> {
        self.publish_payload(event.encode())
    }

    /// Send an already encoded event payload (kind byte plus body).
    pub fn publish_payload(&self, payload: Bytes) -> Result<(), ClientError> {
        let frame = Frame::publish(&payload)?;
        self.outbound
            .send(frame.into_bytes())
            .map_err(|_| ClientError::connection("connection to broker is closed"))
    }
}
