//! # RelayMQ Core Library
//!
//! RelayMQ is a binary pub/sub event bus that mediates between the command
//! and query sides of a CQRS application. A single broker accepts long-lived
//! TCP connections; every connection can publish events of numerically
//! identified types and subscribe to receive forwarded events of chosen
//! types. Published events are appended to a per-type ordered log, and a
//! subscriber may request a full historical replay of its types before live
//! delivery begins.
//!
//! ## Architecture Overview
//!
//! - [`broker`] - TCP listener, per-connection state machine, consumer
//!   registry and fan-out publisher
//! - [`protocol`] - the length-prefixed frame format and its codec
//! - [`storage`] - the append-only per-type event log (in-memory and
//!   file-backed implementations)
//! - [`config`] - broker configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relaymq::{BrokerConfig, BrokerServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BrokerConfig {
//!         port: 5672,
//!         host: "0.0.0.0".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let server = BrokerServer::new(config)?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod config;
pub mod protocol;
pub mod storage;

pub use broker::{BrokerServer, ConsumerRegistry, Publisher};
pub use config::BrokerConfig;
pub use protocol::{Frame, FrameCodec, FrameType};
pub use storage::{EventLog, FileEventLog, InMemoryEventLog};

use thiserror::Error;

/// RelayMQ error types
///
/// Covers every failure surfaced by the broker: storage faults, frame
/// encoding limits, network failures and configuration mistakes.
#[derive(Debug, Error)]
pub enum RelaymqError {
    /// Storage subsystem errors including file I/O and persistence failures
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Frame encoding errors
    #[error("Frame error: {0}")]
    Frame(#[from] protocol::FrameError),

    /// Network-related errors including connection failures
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration validation errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias used throughout the RelayMQ codebase.
pub type Result<T> = std::result::Result<T, RelaymqError>;
