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

//! In-memory transport for tests.
//!
//! A [`MemoryTransport`] pair behaves like the two ends of a TCP connection
//! without touching the network stack, so channel and dispatcher behavior
//! can be exercised deterministically.

use crate::transport::{Transport, TransportId, TransportMetadata};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

/// Default buffer size for memory transport pipes.
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// In-memory transport backed by a Tokio duplex pipe.
///
/// # Examples
///
/// ```rust
/// use scsrpc::transport::MemoryTransport;
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (mut client, mut server) = MemoryTransport::pair(1024);
///
/// client.write_all(b"Hello!").await?;
///
/// let mut buffer = vec![0u8; 6];
/// server.read_exact(&mut buffer).await?;
/// assert_eq!(&buffer, b"Hello!");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryTransport {
    metadata: TransportMetadata,
    stream: DuplexStream,
}

impl MemoryTransport {
    /// Creates a connected pair; each direction buffers up to `buffer_size` bytes.
    ///
    /// Writes block once a direction's buffer is full, until the peer reads.
    pub fn pair(buffer_size: usize) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(buffer_size);
        (
            Self {
                metadata: TransportMetadata::new(TransportId::next(), "memory"),
                stream: a,
            },
            Self {
                metadata: TransportMetadata::new(TransportId::next(), "memory"),
                stream: b,
            },
        )
    }

    /// Creates a connected pair with the default buffer size.
    pub fn pair_default() -> (Self, Self) {
        Self::pair(DEFAULT_BUFFER_SIZE)
    }
}

impl Transport for MemoryTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }
}

impl AsyncRead for MemoryTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryTransport {
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
