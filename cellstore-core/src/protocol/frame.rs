//! Length-prefixed framing for the store's transport.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{CellstoreError, Result};

/// Size of the frame length field on the wire.
pub const SIZE_OF_LENGTH_FIELD: usize = 4;

/// Upper bound on a single frame's payload.
///
/// A peer announcing a larger frame is treated as protocol corruption.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// A single frame: a 4-byte big-endian length prefix followed by the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame payload (one complete RPC message).
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame wrapping the given payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Returns the size of this frame on the wire, prefix included.
    pub fn wire_size(&self) -> usize {
        SIZE_OF_LENGTH_FIELD + self.payload.len()
    }

    /// Writes this frame to the given buffer.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_size());
        dst.put_u32(self.payload.len() as u32);
        dst.put_slice(&self.payload);
    }

    /// Reads a frame from the given buffer.
    ///
    /// Returns `Ok(None)` if there isn't enough data for a complete frame;
    /// the buffer is left untouched in that case.
    pub fn read_from(src: &mut BytesMut) -> Result<Option<Self>> {
        if src.len() < SIZE_OF_LENGTH_FIELD {
            return Ok(None);
        }

        let payload_length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if payload_length > MAX_FRAME_LENGTH {
            return Err(CellstoreError::Connection(format!(
                "frame of {} bytes exceeds maximum of {}",
                payload_length, MAX_FRAME_LENGTH
            )));
        }

        if src.len() < SIZE_OF_LENGTH_FIELD + payload_length {
            return Ok(None);
        }

        src.advance(SIZE_OF_LENGTH_FIELD);
        let payload = src.split_to(payload_length).freeze();
        Ok(Some(Self::new(payload)))
    }
}

/// Codec for reading and writing frames over tokio's framed I/O.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Creates a new codec instance.
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = CellstoreError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() > MAX_FRAME_LENGTH {
            return Err(CellstoreError::Connection(format!(
                "refusing to send frame of {} bytes",
                item.len()
            )));
        }
        Frame::new(item).write_to(dst);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = CellstoreError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        Ok(Frame::read_from(src)?.map(|frame| frame.payload))
    }
}
