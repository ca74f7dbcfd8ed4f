//! A single session against one host of a configured pool.

use bytes::Bytes;
use rand::Rng;

use cellstore_core::protocol::message::{Request, Response};
use cellstore_core::protocol::Procedure;
use cellstore_core::{CellstoreError, Result};

use crate::config::ConnectionConfig;
use crate::table::Table;
use crate::transport::{RpcChannel, TcpTransport, Transport};

/// Picks a host uniformly at random from the pool.
///
/// A fresh draw happens on every open; the selection is not sticky.
fn choose_host<'a>(pool: &'a [String], rng: &mut impl Rng) -> Option<&'a String> {
    if pool.is_empty() {
        return None;
    }
    pool.get(rng.gen_range(0..pool.len()))
}

/// A fault-tolerant session against the store.
///
/// A connection owns exactly one network session, used by one logical
/// caller: every remote method takes `&mut self`, so concurrent use of a
/// single instance is rejected at compile time. Pooling independent
/// connections is the caller's concern.
///
/// Constructed closed; [`open`](Connection::open) establishes the session.
/// Every remote call goes through [`invoke`](Connection::invoke), which
/// recovers from a transport failure or stale-session fault by reopening
/// the session and re-issuing the call exactly once.
pub struct Connection {
    config: ConnectionConfig,
    transport: Box<dyn Transport>,
    channel: Option<Box<dyn RpcChannel>>,
    current_host: Option<String>,
    table_names: Option<Vec<String>>,
}

impl Connection {
    /// Creates a closed connection using the TCP transport.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_transport(config, TcpTransport::new())
    }

    /// Creates a closed connection over a custom transport.
    pub fn with_transport(config: ConnectionConfig, transport: impl Transport + 'static) -> Self {
        Self {
            config,
            transport: Box::new(transport),
            channel: None,
            current_host: None,
            table_names: None,
        }
    }

    /// Returns the connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns the host the current (or last) session was opened against.
    pub fn current_host(&self) -> Option<&str> {
        self.current_host.as_deref()
    }

    /// Returns true if a session is established.
    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Opens a session against a host drawn uniformly from the pool.
    ///
    /// A failed open leaves the connection closed and surfaces a
    /// configuration error; the handshake is never retried.
    pub async fn open(&mut self) -> Result<()> {
        self.open_session(false, None).await
    }

    async fn open_session(&mut self, reconnecting: bool, reason: Option<&str>) -> Result<()> {
        let host = choose_host(self.config.hosts(), &mut rand::thread_rng())
            .ok_or_else(|| {
                CellstoreError::Configuration("no hosts configured".to_string())
            })?
            .clone();
        let port = self.config.port();

        if let Some(mut stale) = self.channel.take() {
            stale.close().await;
        }
        self.current_host = Some(host.clone());

        if reconnecting {
            tracing::warn!(
                host = %host,
                port = port,
                reconnecting = true,
                reason = reason.unwrap_or("unknown"),
                "reopening session"
            );
        } else {
            tracing::info!(host = %host, port = port, "opening session");
        }

        let channel = self
            .transport
            .connect(&host, port, self.config.timeout())
            .await?;
        self.channel = Some(channel);
        Ok(())
    }

    /// Closes the session if one is established.
    ///
    /// Idempotent: closing a never-opened or already-closed connection is a
    /// no-op and never fails.
    pub async fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
            tracing::debug!(
                host = self.current_host.as_deref().unwrap_or("-"),
                "connection closed"
            );
        }
    }

    /// Dispatches a remote call. This is the single chokepoint for every
    /// RPC.
    ///
    /// On a transport failure or a fault marking the session stale, the
    /// session is reopened and the call re-issued exactly once; a second
    /// failure propagates. Every other error propagates unmodified. If the
    /// procedure is a structural mutation the table-name cache is cleared
    /// whether or not the call succeeded.
    pub async fn invoke(&mut self, request: Request) -> Result<Response> {
        let procedure = request.procedure;
        let result = self.dispatch(&request).await;
        if procedure.invalidates_table_cache() {
            self.table_names = None;
        }
        result
    }

    async fn dispatch(&mut self, request: &Request) -> Result<Response> {
        let channel = self.channel.as_mut().ok_or_else(|| {
            CellstoreError::Connection("connection is not open".to_string())
        })?;

        match channel.call(request).await {
            Ok(response) => Ok(response),
            Err(error) if error.qualifies_for_reconnect() => {
                tracing::warn!(
                    procedure = request.procedure.wire_name(),
                    error = %error,
                    kind = error.kind_name(),
                    "remote call failed, reconnecting"
                );
                self.open_session(true, Some(error.kind_name())).await?;
                match self.channel.as_mut() {
                    Some(channel) => channel.call(request).await,
                    None => Err(CellstoreError::Connection(
                        "session lost during reconnect".to_string(),
                    )),
                }
            }
            Err(error) => Err(error),
        }
    }

    /// Returns the names of every table in the store.
    ///
    /// The list is cached until a structural mutation (create or delete
    /// table) is dispatched through this connection. Row-level mutations
    /// and increments leave the cache untouched.
    pub async fn tables(&mut self) -> Result<Vec<String>> {
        if let Some(names) = &self.table_names {
            return Ok(names.clone());
        }

        let response = self
            .invoke(Request::new(Procedure::ListTables, Bytes::new()))
            .await?;

        let mut reader = cellstore_core::protocol::WireReader::new(&response.body);
        let count = reader.read_list_len()?;
        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            names.push(reader.read_str()?);
        }

        self.table_names = Some(names.clone());
        Ok(names)
    }

    /// Returns the cached table-name list, if populated.
    pub fn cached_table_names(&self) -> Option<&[String]> {
        self.table_names.as_deref()
    }

    /// Returns a table handle bound to this connection.
    ///
    /// The table's existence is not verified; use
    /// [`Table::exists`](crate::Table::exists) for that.
    pub fn load_table(&mut self, name: impl Into<String>) -> Table<'_> {
        Table::new(self, name)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("hosts", &self.config.hosts())
            .field("port", &self.config.port())
            .field("current_host", &self.current_host)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
