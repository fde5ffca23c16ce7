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

use crate::transport::TransportMetadata;
use tokio::io::{AsyncRead, AsyncWrite};

/// A connected, bi-directional byte stream.
///
/// `Transport` extends Tokio's `AsyncRead + AsyncWrite` with connection
/// metadata. A [`CommunicationChannel`](crate::channel::CommunicationChannel)
/// can be built on any transport, which is how the in-memory transport stands
/// in for a socket in tests.
///
/// # Implementations
///
/// - [`TcpTransport`](crate::transport::TcpTransport): TCP/IP networking
/// - [`MemoryTransport`](crate::transport::MemoryTransport): in-process pipes
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Returns metadata about this transport.
    fn metadata(&self) -> &TransportMetadata;
}
