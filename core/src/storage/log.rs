use crate::storage::EventLog;
use crate::{RelaymqError, Result};
use bytes::Bytes;
use dashmap::DashMap;
use memmap2::MmapOptions;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Record format (big-endian):
/// [length: 4 bytes][crc: 4 bytes][timestamp: 8 bytes][payload: remaining bytes]
///
/// `length` counts everything after the length prefix; `crc` covers the
/// timestamp and payload.
const RECORD_PREFIX_SIZE: usize = 4;
const RECORD_HEADER_SIZE: usize = 12; // crc (4) + timestamp (8)

/// Durable event log: one append-only file per event type identifier.
///
/// Appends for one type are serialized by a per-type mutex, which also makes
/// each `list_ascending` a consistent snapshot. Files are recovered on first
/// open by truncating any trailing partial or corrupted record.
#[derive(Debug)]
pub struct FileEventLog {
    data_dir: PathBuf,
    logs: DashMap<u8, Arc<Mutex<TypeLog>>>,
}

impl FileEventLog {
    /// Open (creating if needed) the log directory.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            logs: DashMap::new(),
        })
    }

    fn path_for(&self, kind: u8) -> PathBuf {
        self.data_dir.join(format!("events-{kind:03}.log"))
    }

    fn type_log(&self, kind: u8) -> Result<Arc<Mutex<TypeLog>>> {
        use dashmap::mapref::entry::Entry;

        match self.logs.entry(kind) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let log = TypeLog::open(self.path_for(kind))?;
                let log = Arc::new(Mutex::new(log));
                entry.insert(log.clone());
                Ok(log)
            }
        }
    }
}

impl EventLog for FileEventLog {
    fn append(&self, kind: u8, payload: &[u8]) -> Result<()> {
        let log = self.type_log(kind)?;
        let mut log = log.lock();
        log.append(payload)
    }

    fn list_ascending(&self, kind: u8) -> Result<Vec<Bytes>> {
        if !self.logs.contains_key(&kind) && !self.path_for(kind).exists() {
            return Ok(Vec::new());
        }
        let log = self.type_log(kind)?;
        let log = log.lock();
        log.list()
    }

    fn latest(&self, kind: u8) -> Result<Option<Bytes>> {
        Ok(self.list_ascending(kind)?.pop())
    }
}

/// The append-only log file for a single event type.
#[derive(Debug)]
struct TypeLog {
    path: PathBuf,
    file: File,
}

impl TypeLog {
    fn open(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let mut log = TypeLog { path, file };
        log.scan_and_recover()?;
        Ok(log)
    }

    fn append(&mut self, payload: &[u8]) -> Result<()> {
        let record = encode_record(payload)?;
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&record)?;
        self.file.sync_all()?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<Bytes>> {
        let file_size = self.file.metadata()?.len() as usize;
        if file_size == 0 {
            return Ok(Vec::new());
        }

        let mmap = unsafe { MmapOptions::new().map(&self.file)? };

        let mut payloads = Vec::new();
        let mut pos = 0;
        while pos < mmap.len() {
            match decode_record(&mmap[pos..]) {
                Ok((payload, consumed)) => {
                    payloads.push(payload);
                    pos += consumed;
                }
                Err(e) => {
                    warn!(
                        "log corruption in {} at offset {}: {}",
                        self.path.display(),
                        pos,
                        e
                    );
                    break;
                }
            }
        }

        Ok(payloads)
    }

    /// Scan the file on open, truncating any trailing partial or corrupted
    /// record left by a crash.
    fn scan_and_recover(&mut self) -> Result<()> {
        let file_size = self.file.metadata()?.len() as usize;
        if file_size == 0 {
            return Ok(());
        }

        let mmap = unsafe { MmapOptions::new().map(&self.file)? };
        let mut pos = 0;
        let mut truncated = false;

        while pos < mmap.len() {
            match decode_record(&mmap[pos..]) {
                Ok((_, consumed)) => pos += consumed,
                Err(_) => {
                    truncated = true;
                    break;
                }
            }
        }

        drop(mmap);

        if truncated {
            warn!(
                "truncating {} to {} bytes after recovery scan",
                self.path.display(),
                pos
            );
            self.file.set_len(pos as u64)?;
            self.file.sync_all()?;
        }

        Ok(())
    }
}

fn encode_record(payload: &[u8]) -> Result<Vec<u8>> {
    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        RelaymqError::Storage(io::Error::new(
            io::ErrorKind::InvalidInput,
            "event payload exceeds u32::MAX bytes",
        ))
    })?;
    let record_len = payload_len.checked_add(RECORD_HEADER_SIZE as u32).ok_or_else(|| {
        RelaymqError::Storage(io::Error::new(
            io::ErrorKind::InvalidInput,
            "event record size overflow",
        ))
    })?;

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let mut body = Vec::with_capacity(8 + payload.len());
    body.extend_from_slice(&timestamp.to_be_bytes());
    body.extend_from_slice(payload);
    let crc = crc32fast::hash(&body);

    let mut record = Vec::with_capacity(RECORD_PREFIX_SIZE + record_len as usize);
    record.extend_from_slice(&record_len.to_be_bytes());
    record.extend_from_slice(&crc.to_be_bytes());
    record.extend_from_slice(&body);
    Ok(record)
}

/// Decode one record from the front of `data`, returning the payload and
/// the total bytes consumed.
fn decode_record(data: &[u8]) -> Result<(Bytes, usize)> {
    if data.len() < RECORD_PREFIX_SIZE {
        return Err(RelaymqError::Storage(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "insufficient data for record length",
        )));
    }

    let record_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if record_len < RECORD_HEADER_SIZE || data.len() < RECORD_PREFIX_SIZE + record_len {
        return Err(RelaymqError::Storage(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "insufficient data for record",
        )));
    }

    let crc = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    let body = &data[8..RECORD_PREFIX_SIZE + record_len];
    if crc != crc32fast::hash(body) {
        return Err(RelaymqError::Storage(io::Error::new(
            io::ErrorKind::InvalidData,
            "crc mismatch in event record",
        )));
    }

    let payload = Bytes::copy_from_slice(&body[8..]);
    Ok((payload, RECORD_PREFIX_SIZE + record_len))
}
