//! # RelayMQ Storage Module
//!
//! Append-only storage of serialized event payloads, partitioned by event
//! type identifier. Two implementations are provided:
//!
//! - [`InMemoryEventLog`] - per-type vectors behind a sharded map; history
//!   lives for the process lifetime only
//! - [`FileEventLog`] - one append-only log file per type with CRC-checked
//!   records and truncate-on-corruption recovery
//!
//! Both serialize appends per type and hand out consistent snapshots for
//! replay, and both are called from worker threads so storage latency never
//! stalls a connection's I/O task.

pub mod log;

pub use log::FileEventLog;

use crate::Result;
use bytes::Bytes;
use dashmap::DashMap;
use std::fmt;

/// The per-type append-only event log.
///
/// Methods may block on storage; the broker invokes them through
/// `spawn_blocking`. Implementations must serialize appends per type and
/// return `list_ascending` snapshots that never interleave out of order.
pub trait EventLog: Send + Sync + fmt::Debug {
    /// Store `payload` under `kind`, after everything previously appended
    /// for that kind. Duplicates are permitted.
    fn append(&self, kind: u8, payload: &[u8]) -> Result<()>;

    /// Every payload ever appended for `kind`, in append order.
    fn list_ascending(&self, kind: u8) -> Result<Vec<Bytes>>;

    /// The most recently appended payload for `kind`, if any.
    fn latest(&self, kind: u8) -> Result<Option<Bytes>>;
}

/// Event log held entirely in memory.
///
/// The shard lock of the underlying map serializes appends per type and
/// makes each `list_ascending` a consistent snapshot.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: DashMap<u8, Vec<Bytes>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLog for InMemoryEventLog {
    fn append(&self, kind: u8, payload: &[u8]) -> Result<()> {
        self.events
            .entry(kind)
            .or_default()
            .push(Bytes::copy_from_slice(payload));
        Ok(())
    }

    fn list_ascending(&self, kind: u8) -> Result<Vec<Bytes>> {
        Ok(self
            .events
            .get(&kind)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    fn latest(&self, kind: u8) -> Result<Option<Bytes>> {
        Ok(self
            .events
            .get(&kind)
            .and_then(|entry| entry.last().cloned()))
    }
}
