//! Error types for cellstore operations.

use std::fmt;
use std::io;

use thiserror::Error;

/// Fault codes a server attaches to an application-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    /// Unclassified server-side failure.
    Internal,
    /// The server rejected an argument of the call.
    IllegalArgument,
    /// The server no longer recognizes the client's session.
    InvalidSession,
    /// The named table does not exist.
    TableNotFound,
    /// The referenced scanner has expired or was never opened.
    ScannerExpired,
}

impl FaultCode {
    /// Decodes a fault code from its wire value.
    ///
    /// Unknown codes decode as [`FaultCode::Internal`] so that newer servers
    /// never break dispatch.
    pub fn from_wire(code: i32) -> Self {
        match code {
            2 => Self::IllegalArgument,
            3 => Self::InvalidSession,
            4 => Self::TableNotFound,
            5 => Self::ScannerExpired,
            _ => Self::Internal,
        }
    }

    /// Returns the wire value for this fault code.
    pub fn to_wire(self) -> i32 {
        match self {
            Self::Internal => 1,
            Self::IllegalArgument => 2,
            Self::InvalidSession => 3,
            Self::TableNotFound => 4,
            Self::ScannerExpired => 5,
        }
    }

    /// Returns true if the fault means the server-side session is stale.
    ///
    /// Stale-session faults qualify for the connection's reconnect-and-retry
    /// path; every other fault propagates to the caller untouched.
    pub fn is_stale_session(self) -> bool {
        matches!(self, Self::InvalidSession | Self::ScannerExpired)
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Internal => "internal",
            Self::IllegalArgument => "illegal-argument",
            Self::InvalidSession => "invalid-session",
            Self::TableNotFound => "table-not-found",
            Self::ScannerExpired => "scanner-expired",
        };
        f.write_str(name)
    }
}

/// The main error type for cellstore operations.
#[derive(Debug, Error)]
pub enum CellstoreError {
    /// Invalid or missing connection parameters, detected when a session is
    /// opened. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transient IO, transport or protocol failure mid-call. Recovered
    /// locally with exactly one reconnect-and-retry per originating call.
    #[error("connection error: {0}")]
    Connection(String),

    /// The RPC completed but the server reported a failure.
    #[error("application fault ({code}): {message}")]
    Application {
        /// Classification reported by the server.
        code: FaultCode,
        /// Server-provided failure message.
        message: String,
    },

    /// A requested row id was absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A decoded value did not match its declared type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A disallowed query shape or argument.
    #[error("argument error: {0}")]
    Argument(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CellstoreError {
    /// Returns true for transport-level failures (IO, disconnect, timeout).
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Io(_))
    }

    /// Returns true for application faults whose code marks a stale session.
    pub fn is_stale_session(&self) -> bool {
        matches!(self, Self::Application { code, .. } if code.is_stale_session())
    }

    /// Returns true if the failure qualifies for the connection's single
    /// reconnect-and-retry cycle.
    pub fn qualifies_for_reconnect(&self) -> bool {
        self.is_connection_fault() || self.is_stale_session()
    }

    /// Returns true if the server reported that the table does not exist.
    pub fn is_table_missing(&self) -> bool {
        matches!(
            self,
            Self::Application {
                code: FaultCode::TableNotFound,
                ..
            }
        )
    }

    /// Short stable name of the error kind, for structured log fields.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Connection(_) => "connection",
            Self::Application { .. } => "application",
            Self::NotFound(_) => "not-found",
            Self::TypeMismatch(_) => "type-mismatch",
            Self::Argument(_) => "argument",
            Self::Io(_) => "io",
        }
    }
}

/// A specialized `Result` type for cellstore operations.
pub type Result<T> = std::result::Result<T, CellstoreError>;
