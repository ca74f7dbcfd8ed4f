//! Primitive reader/writer for the store's binary encoding.
//!
//! All multi-byte values are big-endian. Byte strings and UTF-8 strings are
//! length-prefixed with an `i32`. Truncated or malformed input is reported as
//! a connection fault: a peer that garbles its own encoding is
//! indistinguishable from a corrupted transport.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CellstoreError, Result};

/// A buffer-backed writer for wire values.
#[derive(Debug, Default)]
pub struct WireWriter {
    buffer: BytesMut,
}

impl WireWriter {
    /// Creates a new writer with default capacity.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Writes a single unsigned byte.
    pub fn write_u8(&mut self, v: u8) {
        self.buffer.put_u8(v);
    }

    /// Writes a 32-bit signed integer.
    pub fn write_i32(&mut self, v: i32) {
        self.buffer.put_i32(v);
    }

    /// Writes a 64-bit signed integer.
    pub fn write_i64(&mut self, v: i64) {
        self.buffer.put_i64(v);
    }

    /// Writes a length-prefixed byte string.
    pub fn write_bytes(&mut self, v: &[u8]) {
        self.buffer.put_i32(v.len() as i32);
        self.buffer.put_slice(v);
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, v: &str) {
        self.write_bytes(v.as_bytes());
    }

    /// Appends raw bytes without a length prefix.
    pub fn write_raw(&mut self, v: &[u8]) {
        self.buffer.put_slice(v);
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes the writer and returns the written bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }
}

/// A cursor-style reader over a wire-encoded buffer.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
}

impl<'a> WireReader<'a> {
    /// Creates a new reader over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Returns the number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(CellstoreError::Connection(format!(
                "truncated message: need {} bytes, have {}",
                n,
                self.data.len()
            )));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    /// Reads a single unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a 32-bit signed integer.
    pub fn read_i32(&mut self) -> Result<i32> {
        let mut head = self.take(4)?;
        Ok(head.get_i32())
    }

    /// Reads a 64-bit signed integer.
    pub fn read_i64(&mut self) -> Result<i64> {
        let mut head = self.take(8)?;
        Ok(head.get_i64())
    }

    fn read_len(&mut self) -> Result<usize> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(CellstoreError::Connection(format!(
                "negative length prefix: {}",
                len
            )));
        }
        Ok(len as usize)
    }

    /// Reads a length-prefixed byte string.
    pub fn read_bytes(&mut self) -> Result<Bytes> {
        let len = self.read_len()?;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            CellstoreError::Connection(format!("invalid UTF-8 in wire string: {}", e))
        })
    }

    /// Reads a list length prefix.
    pub fn read_list_len(&mut self) -> Result<usize> {
        self.read_len()
    }

    /// Returns all unread bytes, consuming the reader.
    pub fn into_rest(self) -> &'a [u8] {
        self.data
    }
}
