//! The seam between the connection and the wire.
//!
//! `Transport` establishes sessions, `RpcChannel` carries calls over one
//! session. The production implementation speaks the framed binary protocol
//! over TCP; tests substitute scripted in-process fakes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Decoder, Encoder};

use cellstore_core::protocol::message::{self, Reply, Request, Response};
use cellstore_core::protocol::FrameCodec;
use cellstore_core::{CellstoreError, Result};

/// One session's call surface.
///
/// A channel is owned by exactly one [`Connection`](crate::Connection) and
/// used by one caller at a time; calls block until the reply arrives or the
/// per-call timeout elapses.
#[async_trait]
pub trait RpcChannel: Send {
    /// Invokes a remote procedure and waits for its reply.
    async fn call(&mut self, request: &Request) -> Result<Response>;

    /// Tears the session down. Never fails.
    async fn close(&mut self);
}

/// Establishes sessions against a single host.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects to `host:port` within `connect_timeout`.
    ///
    /// Any failure to establish the session is a configuration error: the
    /// caller gave us an endpoint we cannot reach.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RpcChannel>>;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Transport")
    }
}

impl std::fmt::Debug for dyn RpcChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RpcChannel")
    }
}

/// The production transport: framed binary protocol over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    /// Creates a new TCP transport.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RpcChannel>> {
        let address = format!("{}:{}", host, port);

        let stream = timeout(connect_timeout, TcpStream::connect(address.as_str()))
            .await
            .map_err(|_| {
                CellstoreError::Configuration(format!(
                    "connection to {} timed out after {:?}",
                    address, connect_timeout
                ))
            })?
            .map_err(|e| {
                CellstoreError::Configuration(format!("unable to connect to {}: {}", address, e))
            })?;

        stream.set_nodelay(true).map_err(|e| {
            CellstoreError::Configuration(format!("failed to set TCP_NODELAY: {}", e))
        })?;

        tracing::debug!(address = %address, "established session");
        Ok(Box::new(TcpChannel::new(stream, address, connect_timeout)))
    }
}

/// A live session over a TCP stream.
pub struct TcpChannel {
    stream: TcpStream,
    address: String,
    call_timeout: Duration,
    codec: FrameCodec,
    read_buffer: BytesMut,
    seq: i32,
}

impl TcpChannel {
    fn new(stream: TcpStream, address: String, call_timeout: Duration) -> Self {
        Self {
            stream,
            address,
            call_timeout,
            codec: FrameCodec::new(),
            read_buffer: BytesMut::with_capacity(8192),
            seq: 0,
        }
    }

    async fn send_frame(&mut self, payload: Bytes) -> Result<()> {
        let mut buf = BytesMut::new();
        self.codec.encode(payload, &mut buf)?;
        self.stream.write_all(&buf).await.map_err(|e| {
            CellstoreError::Connection(format!("failed to write to {}: {}", self.address, e))
        })
    }

    async fn receive_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(payload) = self.codec.decode(&mut self.read_buffer)? {
                return Ok(payload);
            }

            let bytes_read = self
                .stream
                .read_buf(&mut self.read_buffer)
                .await
                .map_err(|e| {
                    CellstoreError::Connection(format!(
                        "failed to read from {}: {}",
                        self.address, e
                    ))
                })?;

            if bytes_read == 0 {
                return Err(CellstoreError::Connection(format!(
                    "connection to {} closed unexpectedly",
                    self.address
                )));
            }
        }
    }

    async fn exchange(&mut self, seq: i32, payload: Bytes) -> Result<Response> {
        self.send_frame(payload).await?;
        let reply_payload = self.receive_frame().await?;
        let (reply_seq, reply) = message::decode_reply(&reply_payload)?;

        if reply_seq != seq {
            return Err(CellstoreError::Connection(format!(
                "out-of-order reply from {}: expected seq {}, got {}",
                self.address, seq, reply_seq
            )));
        }

        match reply {
            Reply::Ok(body) => Ok(Response { body }),
            Reply::Fault(fault) => Err(fault.into()),
        }
    }
}

#[async_trait]
impl RpcChannel for TcpChannel {
    async fn call(&mut self, request: &Request) -> Result<Response> {
        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;
        let payload = message::encode_call(seq, request);

        match timeout(self.call_timeout, self.exchange(seq, payload)).await {
            Ok(result) => result,
            Err(_) => Err(CellstoreError::Connection(format!(
                "call to {} timed out after {:?}",
                self.address, self.call_timeout
            ))),
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
        tracing::debug!(address = %self.address, "session closed");
    }
}

impl std::fmt::Debug for TcpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpChannel")
            .field("address", &self.address)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}
