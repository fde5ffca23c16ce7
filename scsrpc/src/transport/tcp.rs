//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! TCP transport implementation.
//!
//! Wraps Tokio's `TcpStream` for client and accepted connections, and
//! provides the backlog-aware bind used by the
//! [`ConnectionListener`](crate::transport::ConnectionListener).

use crate::transport::{Transport, TransportError, TransportId, TransportMetadata};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, error, info, instrument};

/// TCP transport implementation.
///
/// # Examples
///
/// ## Client mode
///
/// ```rust,no_run
/// use scsrpc::transport::TcpTransport;
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut transport = TcpTransport::connect("127.0.0.1:8080").await?;
///
/// transport.write_all(b"Hello, server!").await?;
///
/// let mut buffer = vec![0u8; 1024];
/// let n = transport.read(&mut buffer).await?;
/// println!("Received: {:?}", &buffer[..n]);
/// # Ok(())
/// # }
/// ```
///
/// ## Server mode
///
/// ```rust,no_run
/// use scsrpc::transport::TcpTransport;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = TcpTransport::bind("127.0.0.1:8080".parse()?, 128).await?;
/// let (transport, peer_addr) = TcpTransport::accept(&listener).await?;
/// println!("Accepted connection from {}", peer_addr);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    metadata: TransportMetadata,
}

impl TcpTransport {
    /// Creates a new TCP transport from an existing stream.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        let id = TransportId::next();
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;

        debug!(transport_id = %id, %local_addr, %peer_addr, "Created TCP transport from stream");

        let metadata = TransportMetadata::new(id, "tcp")
            .with_local_addr(local_addr)
            .with_peer_addr(peer_addr);

        Ok(Self { stream, metadata })
    }

    /// Connects to a remote TCP endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the connection cannot
    /// be established.
    #[instrument(skip(addr), fields(address))]
    pub async fn connect(addr: impl Into<String>) -> Result<Self, TransportError> {
        let addr_str = addr.into();
        tracing::Span::current().record("address", addr_str.as_str());
        info!("Connecting to TCP endpoint");

        let stream = TcpStream::connect(&addr_str).await.map_err(|e| {
            error!("Failed to connect: {}", e);
            TransportError::ConnectionFailed {
                address: addr_str.clone(),
                source: e,
            }
        })?;

        info!("TCP connection established");
        Self::from_stream(stream).map_err(|e| TransportError::Io { source: e })
    }

    /// Binds a listening socket on `addr` with the given accept backlog.
    ///
    /// Address reuse is enabled on Unix so a restarted server can rebind a
    /// port still in `TIME_WAIT`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the socket cannot be created,
    /// bound or put into the listening state.
    #[instrument(level = "debug")]
    pub async fn bind(addr: SocketAddr, backlog: u32) -> Result<TcpListener, TransportError> {
        let bind_failed = |source: io::Error| {
            error!("Failed to bind: {}", source);
            TransportError::BindFailed {
                address: addr.to_string(),
                source,
            }
        };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_failed)?;

        #[cfg(not(windows))]
        socket.set_reuseaddr(true).map_err(bind_failed)?;

        socket.bind(addr).map_err(bind_failed)?;
        let listener = socket.listen(backlog).map_err(bind_failed)?;

        info!("TCP listener bound successfully");
        Ok(listener)
    }

    /// Accepts one incoming connection from a listener.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AcceptFailed`] if the accept fails, or
    /// [`TransportError::Io`] if the accepted socket's addresses are unavailable.
    pub async fn accept(listener: &TcpListener) -> Result<(Self, SocketAddr), TransportError> {
        let (stream, peer_addr) = listener
            .accept()
            .await
            .map_err(|e| TransportError::AcceptFailed { source: e })?;

        debug!(%peer_addr, "Accepted TCP connection");

        let transport = Self::from_stream(stream).map_err(|e| TransportError::Io { source: e })?;
        Ok((transport, peer_addr))
    }

    /// Returns the local address of this transport.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// Returns the peer address of this transport.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }

    /// Sets the TCP_NODELAY option on the underlying socket.
    ///
    /// Responses are usually small, so disabling Nagle's algorithm lowers
    /// per-call latency.
    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        self.stream.set_nodelay(nodelay)
    }

    /// Gets the TCP_NODELAY option on the underlying socket.
    pub fn nodelay(&self) -> io::Result<bool> {
        self.stream.nodelay()
    }
}

impl Transport for TcpTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

impl AsyncRead for TcpTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn loopback() -> TcpListener {
        TcpTransport::bind("127.0.0.1:0".parse().unwrap(), 16)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_tcp_connect_and_echo() {
        let listener = loopback().await;
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut transport, _) = TcpTransport::accept(&listener).await.unwrap();
            let mut buffer = vec![0u8; 1024];
            let n = transport.read(&mut buffer).await.unwrap();
            transport.write_all(&buffer[..n]).await.unwrap();
        });

        let mut client = TcpTransport::connect(addr.to_string()).await.unwrap();
        client.write_all(b"Hello, server!").await.unwrap();

        let mut buffer = vec![0u8; 1024];
        let n = client.read(&mut buffer).await.unwrap();
        assert_eq!(&buffer[..n], b"Hello, server!");
    }

    #[tokio::test]
    async fn test_tcp_metadata() {
        let listener = loopback().await;
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = TcpTransport::accept(&listener).await;
        });

        let transport = TcpTransport::connect(addr.to_string()).await.unwrap();
        let metadata = transport.metadata();

        assert_eq!(metadata.transport_type, "tcp");
        assert!(metadata.local_addr.is_some());
        assert_eq!(metadata.peer_addr, Some(addr));
    }

    #[tokio::test]
    async fn test_tcp_nodelay() {
        let listener = loopback().await;
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = TcpTransport::accept(&listener).await;
        });

        let transport = TcpTransport::connect(addr.to_string()).await.unwrap();
        transport.set_nodelay(true).unwrap();
        assert!(transport.nodelay().unwrap());
    }

    #[tokio::test]
    async fn test_tcp_connection_refused() {
        let result = TcpTransport::connect("127.0.0.1:1").await;

        match result {
            Err(TransportError::ConnectionFailed { address, .. }) => {
                assert_eq!(address, "127.0.0.1:1");
            }
            other => panic!("Expected ConnectionFailed error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_bind_port_in_use() {
        let listener = loopback().await;
        let addr = listener.local_addr().unwrap();

        let result = TcpTransport::bind(addr, 16).await;
        assert!(matches!(result, Err(TransportError::BindFailed { .. })));
    }
}
