//! Wire protocol and value codec for the cellstore client.

#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod protocol;

pub use error::{CellstoreError, FaultCode, Result};
