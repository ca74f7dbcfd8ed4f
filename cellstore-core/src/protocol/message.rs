//! Request/reply envelope carried inside each frame.
//!
//! A call is `[name][seq][body]`; a reply is `[kind][seq][body or fault]`.
//! Sequence numbers pair replies with calls on a single session.

use bytes::Bytes;

use crate::error::{CellstoreError, FaultCode, Result};
use crate::protocol::procedure::Procedure;
use crate::protocol::wire::{WireReader, WireWriter};

/// Reply kind marker for a successful call.
pub const KIND_REPLY: u8 = 1;
/// Reply kind marker for a server-reported fault.
pub const KIND_FAULT: u8 = 2;

/// An outbound remote call: which procedure, and its encoded arguments.
#[derive(Debug, Clone)]
pub struct Request {
    /// The procedure to invoke.
    pub procedure: Procedure,
    /// Wire-encoded arguments.
    pub body: Bytes,
}

impl Request {
    /// Creates a new request.
    pub fn new(procedure: Procedure, body: Bytes) -> Self {
        Self { procedure, body }
    }
}

/// A successful reply: the wire-encoded result.
#[derive(Debug, Clone)]
pub struct Response {
    /// Wire-encoded result payload.
    pub body: Bytes,
}

/// A server-reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Classification of the failure.
    pub code: FaultCode,
    /// Human-readable message from the server.
    pub message: String,
}

impl From<Fault> for CellstoreError {
    fn from(fault: Fault) -> Self {
        CellstoreError::Application {
            code: fault.code,
            message: fault.message,
        }
    }
}

/// A decoded reply: either a result payload or a fault.
#[derive(Debug, Clone)]
pub enum Reply {
    /// The call succeeded.
    Ok(Bytes),
    /// The server reported a failure.
    Fault(Fault),
}

/// Encodes a call message for the given sequence number.
pub fn encode_call(seq: i32, request: &Request) -> Bytes {
    let mut writer = WireWriter::new();
    writer.write_str(request.procedure.wire_name());
    writer.write_i32(seq);
    writer.write_raw(&request.body);
    writer.into_bytes()
}

/// Decodes a call message into `(seq, procedure name, argument body)`.
///
/// The procedure name is returned as a string so a server can answer an
/// unknown procedure with a fault instead of a framing error.
pub fn decode_call(payload: &[u8]) -> Result<(i32, String, Bytes)> {
    let mut reader = WireReader::new(payload);
    let name = reader.read_str()?;
    let seq = reader.read_i32()?;
    let body = Bytes::copy_from_slice(reader.into_rest());
    Ok((seq, name, body))
}

/// Encodes a successful reply.
pub fn encode_reply(seq: i32, body: &[u8]) -> Bytes {
    let mut writer = WireWriter::new();
    writer.write_u8(KIND_REPLY);
    writer.write_i32(seq);
    writer.write_raw(body);
    writer.into_bytes()
}

/// Encodes a fault reply.
pub fn encode_fault(seq: i32, code: FaultCode, message: &str) -> Bytes {
    let mut writer = WireWriter::new();
    writer.write_u8(KIND_FAULT);
    writer.write_i32(seq);
    writer.write_i32(code.to_wire());
    writer.write_str(message);
    writer.into_bytes()
}

/// Decodes a reply message into `(seq, reply)`.
pub fn decode_reply(payload: &[u8]) -> Result<(i32, Reply)> {
    let mut reader = WireReader::new(payload);
    let kind = reader.read_u8()?;
    let seq = reader.read_i32()?;

    match kind {
        KIND_REPLY => {
            let body = Bytes::copy_from_slice(reader.into_rest());
            Ok((seq, Reply::Ok(body)))
        }
        KIND_FAULT => {
            let code = FaultCode::from_wire(reader.read_i32()?);
            let message = reader.read_str()?;
            Ok((seq, Reply::Fault(Fault { code, message })))
        }
        other => Err(CellstoreError::Connection(format!(
            "unknown reply kind: {}",
            other
        ))),
    }
}
