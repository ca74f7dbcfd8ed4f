//! Framing and message envelope for the store's binary RPC protocol.
//!
//! The remote contract (procedure names, argument shapes) is owned by the
//! store; this module only knows how to frame, address and classify calls.

pub mod frame;
pub mod message;
pub mod procedure;
pub mod wire;

pub use frame::{Frame, FrameCodec, MAX_FRAME_LENGTH};
pub use message::{Fault, Reply, Request, Response};
pub use procedure::Procedure;
pub use wire::{WireReader, WireWriter};
