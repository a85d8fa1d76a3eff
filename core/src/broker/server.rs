use crate::broker::{connection, ConsumerRegistry, Publisher};
use crate::config::BrokerConfig;
use crate::storage::{EventLog, FileEventLog, InMemoryEventLog};
use crate::{RelaymqError, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// The event bus broker: accept loop plus the shared dependencies injected
/// into every connection handler.
pub struct BrokerServer {
    config: BrokerConfig,
    log: Arc<dyn EventLog>,
    registry: Arc<ConsumerRegistry>,
    publisher: Arc<Publisher>,
    shutdown_tx: broadcast::Sender<()>,
    next_connection_id: AtomicU64,
    active_connections: Arc<AtomicUsize>,
}

impl BrokerServer {
    /// Create a broker. The event log is file-backed when `data_dir` is
    /// configured and in-memory otherwise.
    pub fn new(config: BrokerConfig) -> Result<Self> {
        config.validate().map_err(RelaymqError::Config)?;

        let log: Arc<dyn EventLog> = match &config.data_dir {
            Some(dir) => Arc::new(FileEventLog::open(dir)?),
            None => Arc::new(InMemoryEventLog::new()),
        };

        Ok(Self::with_log(config, log))
    }

    /// Create a broker around an externally constructed event log.
    pub fn with_log(config: BrokerConfig, log: Arc<dyn EventLog>) -> Self {
        let registry = Arc::new(ConsumerRegistry::new());
        let publisher = Arc::new(Publisher::new(Arc::clone(&registry)));
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            config,
            log,
            registry,
            publisher,
            shutdown_tx,
            next_connection_id: AtomicU64::new(1),
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn registry(&self) -> &Arc<ConsumerRegistry> {
        &self.registry
    }

    /// Initiate graceful shutdown of the accept loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the configured endpoint and serve until shutdown. A bind
    /// failure is fatal.
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("relaymq broker listening on {}", addr);
        self.serve(listener).await
    }

    /// Accept connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            if self.active_connections.load(Ordering::Relaxed)
                                >= self.config.max_connections
                            {
                                warn!(
                                    "connection limit reached, dropping connection from {}",
                                    peer_addr
                                );
                                continue;
                            }

                            let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
                            self.active_connections.fetch_add(1, Ordering::Relaxed);
                            info!("client {} connected from {}", id, peer_addr);

                            let log = Arc::clone(&self.log);
                            let registry = Arc::clone(&self.registry);
                            let publisher = Arc::clone(&self.publisher);
                            let active = Arc::clone(&self.active_connections);

                            tokio::spawn(async move {
                                match connection::run(stream, id, log, registry, publisher).await {
                                    Ok(()) => info!("client {} disconnected", id),
                                    Err(e) => warn!("client {} ended with error: {}", id, e),
                                }
                                active.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            error!("failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received, stopping accept loop");
                    break;
                }
            }
        }

        Ok(())
    }
}
