//! # RelayMQ Broker Module
//!
//! The broker side of the event bus:
//!
//! - [`server`] - TCP listener and accept loop
//! - [`connection`] - per-socket state machine driving registration,
//!   publish acceptance and historical replay
//! - [`registry`] - event type identifier → subscriber mapping
//! - [`publisher`] - fan-out of `CONSUME` frames to subscribers
//!
//! Each connection is owned by one I/O task. Storage work (log appends and
//! replay reads) runs on the blocking worker pool so disk latency never
//! stalls the event loop; fan-out writes go through per-connection outbound
//! queues so a slow peer cannot block the others.

pub mod connection;
pub mod publisher;
pub mod registry;
pub mod server;

pub use publisher::Publisher;
pub use registry::{ConsumerRegistry, Subscriber};
pub use server::BrokerServer;
