//! Conversions between typed application values and raw cell bytes.
//!
//! Integers live in cells as fixed 8-byte big-endian two's-complement,
//! the store's native integer form and what its server-side atomic
//! increment operates on. Note this is not a sort-preserving encoding for
//! negative numbers.

use std::borrow::Cow;
use std::fmt;

use crate::error::{CellstoreError, Result};

/// Width of a binary integer cell in bytes.
pub const INTEGER_WIDTH: usize = 8;

/// How integer cells written before the binary format should decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegerMode {
    /// Only the fixed 8-byte big-endian form is accepted.
    #[default]
    Binary,
    /// An 8-byte buffer decodes as binary; anything else must be an ASCII
    /// decimal string. Compatibility mode for cells written as plain text.
    BinaryOrDecimal,
}

/// Encodes an integer into its fixed 8-byte big-endian cell form.
pub fn encode_integer(value: i64) -> [u8; INTEGER_WIDTH] {
    value.to_be_bytes()
}

/// Decodes an integer cell.
pub fn decode_integer(bytes: &[u8], mode: IntegerMode) -> Result<i64> {
    if bytes.len() == INTEGER_WIDTH {
        let mut buf = [0u8; INTEGER_WIDTH];
        buf.copy_from_slice(bytes);
        return Ok(i64::from_be_bytes(buf));
    }

    match mode {
        IntegerMode::Binary => Err(CellstoreError::TypeMismatch(format!(
            "expected an {}-byte integer cell, got {} bytes",
            INTEGER_WIDTH,
            bytes.len()
        ))),
        IntegerMode::BinaryOrDecimal => {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                CellstoreError::TypeMismatch(
                    "integer cell is neither binary nor a decimal string".to_string(),
                )
            })?;
            text.parse::<i64>().map_err(|_| {
                CellstoreError::TypeMismatch(format!(
                    "integer cell is not a decimal string: {:?}",
                    text
                ))
            })
        }
    }
}

/// Normalizes raw cell bytes to UTF-8.
///
/// Reads never fail on encoding: bytes that are not valid UTF-8 decode with
/// replacement characters. Writers are expected to supply UTF-8-compatible
/// bytes, in particular for row ids.
pub fn normalize_utf8(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Encodes a boolean into its cell form.
pub fn encode_boolean(value: bool) -> &'static [u8] {
    if value {
        b"true"
    } else {
        b"false"
    }
}

/// Decodes a boolean cell.
///
/// Accepts the canonical `true`/`false` forms plus the legacy `1`/`0`.
pub fn decode_boolean(bytes: &[u8]) -> Result<bool> {
    match bytes {
        b"true" | b"1" => Ok(true),
        b"false" | b"0" => Ok(false),
        other => Err(CellstoreError::TypeMismatch(format!(
            "cell is not a boolean payload: {:?}",
            normalize_utf8(other)
        ))),
    }
}

/// The structured shapes a coder can be asked to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredKind {
    /// A JSON array.
    Array,
    /// A JSON object.
    Map,
}

impl fmt::Display for StructuredKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Array => f.write_str("array"),
            Self::Map => f.write_str("map"),
        }
    }
}

/// Serialization chain for structured (array/map) cell values.
///
/// The object-mapper layer above this crate plugs its own chain in; the
/// codec only depends on the dump/load contract.
pub trait Coder: Send + Sync {
    /// Serializes a structured value into cell bytes.
    fn dump(&self, value: &serde_json::Value) -> Result<Vec<u8>>;

    /// Deserializes cell bytes back into a structured value.
    fn load(&self, bytes: &[u8]) -> Result<serde_json::Value>;
}

/// The default JSON coder.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCoder;

impl JsonCoder {
    /// Creates a new JSON coder.
    pub fn new() -> Self {
        Self
    }
}

impl Coder for JsonCoder {
    fn dump(&self, value: &serde_json::Value) -> Result<Vec<u8>> {
        serde_json::to_vec(value)
            .map_err(|e| CellstoreError::TypeMismatch(format!("cannot serialize value: {}", e)))
    }

    fn load(&self, bytes: &[u8]) -> Result<serde_json::Value> {
        serde_json::from_slice(bytes)
            .map_err(|e| CellstoreError::TypeMismatch(format!("cell is not valid JSON: {}", e)))
    }
}

/// Encodes a structured value through the given coder.
pub fn encode_structured(value: &serde_json::Value, coder: &dyn Coder) -> Result<Vec<u8>> {
    coder.dump(value)
}

/// Decodes a structured cell and verifies it has the declared shape.
///
/// A payload that loads but does not match `kind` is a type mismatch; it is
/// never silently coerced.
pub fn decode_structured(
    bytes: &[u8],
    kind: StructuredKind,
    coder: &dyn Coder,
) -> Result<serde_json::Value> {
    let value = coder.load(bytes)?;
    let matches = match kind {
        StructuredKind::Array => value.is_array(),
        StructuredKind::Map => value.is_object(),
    };
    if matches {
        Ok(value)
    } else {
        Err(CellstoreError::TypeMismatch(format!(
            "expected {} payload, found {}",
            kind,
            json_kind(&value)
        )))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "map",
    }
}
