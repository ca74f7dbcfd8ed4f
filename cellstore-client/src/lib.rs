//! Async client for a distributed column-oriented store.
//!
//! The client owns one session per [`Connection`], selects a host uniformly
//! at random from the configured pool on every open, and recovers from
//! transport failures or stale-session faults by reconnecting and
//! re-issuing the failed call exactly once. Table metadata (the table-name
//! list) is cached per connection and invalidated only by structural
//! mutations.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cellstore_client::{Connection, ConnectionConfig, ScanOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::builder()
//!         .hosts(["10.0.0.1", "10.0.0.2"])
//!         .port(9090)
//!         .build();
//!
//!     let mut conn = Connection::new(config);
//!     conn.open().await?;
//!
//!     let mut people = conn.load_table("people");
//!     let row = people.find("ID1").await?;
//!     println!("{:?}", row.values());
//!
//!     let recent = people
//!         .all(ScanOptions::new().starts_with("2026-").limit(10))
//!         .await?;
//!     println!("{} rows", recent.len());
//!
//!     conn.close().await;
//!     Ok(())
//! }
//! ```
//!
//! One connection is one synchronous caller: every remote method takes
//! `&mut self`. For concurrency, pool independent `Connection` instances.

pub mod config;
pub mod connection;
pub mod retry;
pub mod row;
pub mod scan;
pub mod table;
pub mod transport;

pub use cellstore_core::{codec, CellstoreError, FaultCode, Result};
pub use config::{ConnectionConfig, ConnectionConfigBuilder, RetryConfig, RetryConfigBuilder};
pub use connection::Connection;
pub use retry::RetryPolicy;
pub use row::{Cell, Row};
pub use scan::ScanOptions;
pub use table::{ColumnFamily, FindOptions, Table};
pub use transport::{RpcChannel, TcpTransport, Transport};
