use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Frame header: type (1) + flags (1) + reserved (4) + size (2, big-endian).
pub const HEADER_SIZE: usize = 8;

/// Sentinel byte terminating every frame.
pub const END_MARKER: u8 = 0xFF;

/// Bit 0 of the flags byte; meaningful only on `REGISTER_CONSUMERS`.
pub const FLAG_REPLAY_REQUESTED: u8 = 0x01;

/// Smallest well-formed frame: header plus end marker.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + 1;

/// Largest payload the 16-bit size field can describe.
pub const MAX_PAYLOAD: usize = u16::MAX as usize - MIN_FRAME_SIZE;

const TYPE_OFFSET: usize = 0;
const FLAGS_OFFSET: usize = 1;
const SIZE_OFFSET: usize = 6;

/// Frame encoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload of {size} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge { size: usize, max: usize },
}

/// The three frame kinds carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    RegisterConsumers = 1,
    Publish = 2,
    Consume = 3,
}

impl FrameType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(FrameType::RegisterConsumers),
            2 => Some(FrameType::Publish),
            3 => Some(FrameType::Consume),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// An immutable on-wire frame.
///
/// Frames built through [`Frame::build`] or taken from the buffer splitter
/// are self-consistent: the size field matches the byte length, the last
/// byte is the end marker and the type byte is one of the defined values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Encode a frame from its parts.
    ///
    /// Fails only when the payload does not fit the 16-bit size field; that
    /// is a caller bug, not a recoverable wire condition.
    pub fn build(frame_type: FrameType, flags: u8, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }

        let total = HEADER_SIZE + payload.len() + 1;
        let mut buf = BytesMut::with_capacity(total);
        buf.put_u8(frame_type.as_byte());
        buf.put_u8(flags);
        buf.put_u32(0); // reserved, must be zero on send
        buf.put_u16(total as u16);
        buf.put_slice(payload);
        buf.put_u8(END_MARKER);

        Ok(Frame { bytes: buf.freeze() })
    }

    /// Registration frame listing the event type bytes the sender consumes.
    pub fn register_consumers(kinds: &[u8], replay: bool) -> Result<Self, FrameError> {
        let flags = if replay { FLAG_REPLAY_REQUESTED } else { 0 };
        Self::build(FrameType::RegisterConsumers, flags, kinds)
    }

    pub fn publish(payload: &[u8]) -> Result<Self, FrameError> {
        Self::build(FrameType::Publish, 0, payload)
    }

    pub fn consume(payload: &[u8]) -> Result<Self, FrameError> {
        Self::build(FrameType::Consume, 0, payload)
    }

    /// The frame type byte, or `None` for an undefined value.
    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::from_byte(self.bytes[TYPE_OFFSET])
    }

    pub fn flags(&self) -> u8 {
        self.bytes[FLAGS_OFFSET]
    }

    pub fn replay_requested(&self) -> bool {
        self.flags() & FLAG_REPLAY_REQUESTED != 0
    }

    /// Total frame length as recorded in the size field.
    pub fn size(&self) -> u16 {
        u16::from_be_bytes([self.bytes[SIZE_OFFSET], self.bytes[SIZE_OFFSET + 1]])
    }

    /// The bytes between the header and the end marker. Empty when the frame
    /// carries no payload.
    pub fn payload(&self) -> Bytes {
        if self.bytes.len() <= MIN_FRAME_SIZE {
            return Bytes::new();
        }
        self.bytes.slice(HEADER_SIZE..self.bytes.len() - 1)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// Take one complete frame off the front of `buf`, skipping garbage.
///
/// Advances past unparseable bytes one at a time so a stream can recover
/// frame alignment after corruption. Returns `None` when the buffer holds no
/// complete frame; the remaining bytes stay in `buf` for the next read.
fn take_frame(buf: &mut BytesMut) -> Option<Frame> {
    loop {
        if buf.len() < HEADER_SIZE {
            return None;
        }

        if FrameType::from_byte(buf[TYPE_OFFSET]).is_none() {
            buf.advance(1);
            continue;
        }

        let size = u16::from_be_bytes([buf[SIZE_OFFSET], buf[SIZE_OFFSET + 1]]) as usize;
        if size < MIN_FRAME_SIZE {
            buf.advance(1);
            continue;
        }

        if buf.len() < size {
            return None;
        }

        if buf[size - 1] != END_MARKER {
            buf.advance(1);
            continue;
        }

        let bytes = buf.split_to(size).freeze();
        return Some(Frame { bytes });
    }
}

/// Split an inbound byte buffer into every complete frame it contains.
///
/// Tolerates concatenated frames within one TCP segment; a partial frame at
/// the tail is left in `buf` for the next read.
pub fn split_buffer(buf: &mut BytesMut) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Some(frame) = take_frame(buf) {
        frames.push(frame);
    }
    frames
}

/// `tokio_util` codec for [`Frame`] streams.
///
/// Decoding never fails: malformed input is skipped by byte-advance until a
/// well-formed frame or the end of the buffer is reached.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        FrameCodec
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Self::Error> {
        Ok(take_frame(src))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = std::io::Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(frame.as_bytes());
        Ok(())
    }
}
