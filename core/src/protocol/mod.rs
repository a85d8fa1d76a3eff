//! # RelayMQ Protocol Module
//!
//! The on-wire frame format shared by broker and clients. Every message is a
//! length-prefixed frame with an 8-byte header, an opaque payload and a
//! trailing `0xFF` end marker:
//!
//! ```text
//! ┌──────┬───────┬────────────┬────────────┬─────────┬──────┐
//! │ type │ flags │ reserved   │ size       │ payload │ 0xFF │
//! │ (1B) │ (1B)  │ (4B, zero) │ (2B BE)    │         │      │
//! └──────┴───────┴────────────┴────────────┴─────────┴──────┘
//! ```
//!
//! `size` is the total frame length including header and end marker. For
//! `PUBLISH` and `CONSUME` frames the first payload byte is the event type
//! identifier; the rest is the serialized event body, opaque to the bus.

pub mod frame;

pub use frame::{
    split_buffer, Frame, FrameCodec, FrameError, FrameType, END_MARKER, FLAG_REPLAY_REQUESTED,
    HEADER_SIZE, MAX_PAYLOAD, MIN_FRAME_SIZE,
};
