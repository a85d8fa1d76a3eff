//! Application-facing entry point: dial, queue, drain, publish.

use crate::config::ClientConfig;
use crate::connection::ClientConnection;
use crate::error::ClientError;
use crate::events::DomainEvent;
use crate::receiver::EventReceiver;
use bytes::Bytes;
use parking_lot::Mutex;
use relaymq::protocol::MAX_PAYLOAD;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{error, info, warn};

#[derive(Debug, Default)]
struct ClientState {
    connection: Option<ClientConnection>,
    pending: VecDeque<Bytes>,
}

/// Handle to the event bus.
///
/// `start` dials in the background; events published before the dial
/// completes are queued and drained in FIFO order the moment the connection
/// is ready, so a single producer's events reach the broker in submission
/// order. A failed dial leaves queued events in place (there is no
/// automatic reconnect).
#[derive(Debug, Clone)]
pub struct EventBusClient {
    state: Arc<Mutex<ClientState>>,
}

impl EventBusClient {
    /// Dial the configured broker and register `receivers`.
    pub fn start(config: ClientConfig, receivers: Vec<EventReceiver>) -> Self {
        let client = Self {
            state: Arc::new(Mutex::new(ClientState::default())),
        };

        let state = Arc::clone(&client.state);
        tokio::spawn(async move {
            match Self::dial(&config).await {
                Ok(stream) => {
                    match ClientConnection::establish(stream, config.request_replay, receivers) {
                        Ok(connection) => {
                            let mut state = state.lock();
                            while let Some(payload) = state.pending.pop_front() {
                                if let Err(e) = connection.publish_payload(payload) {
                                    warn!("failed to send queued event: {}", e);
                                }
                            }
                            state.connection = Some(connection);
                            info!("connected to broker at {}", config.addr());
                        }
                        Err(e) => error!("broker registration failed: {}", e),
                    }
                }
                Err(e) => {
                    error!(
                        "connection to {} could not be established: {}",
                        config.addr(),
                        e
                    );
                }
            }
        });

        client
    }

    async fn dial(config: &ClientConfig) -> Result<TcpStream, ClientError> {
        timeout(config.connection_timeout, TcpStream::connect(config.addr()))
            .await
            .map_err(|_| ClientError::timeout(config.connection_timeout.as_millis() as u64))?
            .map_err(|e| {
                ClientError::connection(format!("failed to connect to {}: {}", config.addr(), e))
            })
    }

    /// Publish an event, or queue it if the connection is not ready yet.
    pub fn publish<E: DomainEvent>(&self, event: &E) -> Result<(), ClientError> {
        let payload = event.encode();
        if payload.len() > MAX_PAYLOAD {
            return Err(ClientError::serialization(format!(
                "event of {} bytes exceeds the {} byte frame limit",
                payload.len(),
                MAX_PAYLOAD
            )));
        }

        let mut state = self.state.lock();
        match &state.connection {
            Some(connection) => connection.publish_payload(payload),
            None => {
                state.pending.push_back(payload);
                Ok(())
            }
        }
    }

    /// Whether the dial has completed and queued events have been drained.
    pub fn is_ready(&self) -> bool {
        self.state.lock().connection.is_some()
    }

    /// Number of events waiting for the connection to become ready.
    pub fn pending_events(&self) -> usize {
        self.state.lock().pending.len()
    }
}
