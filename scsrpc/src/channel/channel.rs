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

//! Per-connection communication channel.

use super::{ChannelError, Message};
use crate::observability::TransportMetrics;
use crate::serialization::framing::{FrameDecoder, FramingConfig, encode_frame};
use crate::serialization::{JsonSerializer, Serializer};
use crate::transport::{Transport, TransportError, TransportId, TransportMetadata};
use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of the inbound message queue.
///
/// When it fills up the reader stops pulling from the socket, so a slow
/// consumer pushes back on the peer through TCP flow control.
pub const INBOUND_BUFFER_SIZE: usize = 256;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommunicationState {
    /// The channel is being set up.
    Connecting,
    /// Frames flow in both directions.
    Connected,
    /// The socket closed or faulted. Terminal.
    Disconnected,
}

impl fmt::Display for CommunicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Outbound side of a connection, as seen by the dispatcher.
///
/// [`CommunicationChannel`] is the production implementation; tests supply
/// recording sinks.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Identifier of the underlying transport, for logs.
    fn transport_id(&self) -> TransportId;

    /// Address of the peer, if the transport has one.
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Current lifecycle state.
    fn state(&self) -> CommunicationState;

    /// Frames and writes one message.
    ///
    /// Sends on a channel that is not connected are dropped and return `Ok`.
    async fn send_message(&self, message: &Message) -> Result<(), ChannelError>;
}

/// A framed, message-oriented view of one connection.
///
/// The channel owns the socket. A background task reads bytes, splits them
/// into frames at the delimiter and forwards decoded [`Message`]s to the
/// receiver returned from [`open`](Self::open). Sends from any number of
/// tasks are serialized so frames never interleave on the wire.
///
/// The channel moves to [`CommunicationState::Disconnected`] on end of
/// stream, on any I/O fault, on an oversized frame, or on
/// [`disconnect`](Self::disconnect). Once disconnected, sends are silently
/// dropped.
///
/// # Examples
///
/// ```rust
/// use scsrpc::channel::{CommunicationChannel, Message, RequestMessage};
/// use scsrpc::serialization::framing::FramingConfig;
/// use scsrpc::transport::MemoryTransport;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (a, b) = MemoryTransport::pair_default();
/// let (client, _client_inbound) = CommunicationChannel::open(a, FramingConfig::default());
/// let (_server, mut server_inbound) = CommunicationChannel::open(b, FramingConfig::default());
///
/// client
///     .send_message(&Message::from(RequestMessage::new(1, "Orders", "Find")))
///     .await?;
///
/// let received = server_inbound.recv().await.ok_or("closed")?;
/// assert_eq!(received.correlation_id(), 1);
/// # Ok(())
/// # }
/// ```
pub struct CommunicationChannel<S: Serializer = JsonSerializer> {
    metadata: TransportMetadata,
    serializer: Arc<S>,
    framing: FramingConfig,
    writer: tokio::sync::Mutex<BoxedWriter>,
    state: Arc<watch::Sender<CommunicationState>>,
    metrics: Arc<TransportMetrics>,
    recv_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl CommunicationChannel<JsonSerializer> {
    /// Opens a JSON channel over `transport` with private metrics.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open<T: Transport>(
        transport: T,
        framing: FramingConfig,
    ) -> (Arc<Self>, mpsc::Receiver<Message>) {
        Self::open_with(
            transport,
            JsonSerializer::default(),
            framing,
            Arc::new(TransportMetrics::new()),
        )
    }
}

impl<S: Serializer> CommunicationChannel<S> {
    /// Opens a channel with an explicit serializer and shared metrics.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open_with<T: Transport>(
        transport: T,
        serializer: S,
        framing: FramingConfig,
        metrics: Arc<TransportMetrics>,
    ) -> (Arc<Self>, mpsc::Receiver<Message>) {
        let metadata = transport.metadata().clone();
        let serializer = Arc::new(serializer);
        let (state, _) = watch::channel(CommunicationState::Connecting);
        let state = Arc::new(state);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER_SIZE);
        let (read_half, write_half) = tokio::io::split(transport);

        let recv_task = tokio::spawn(Self::receive_task(
            metadata.id,
            read_half,
            Arc::clone(&serializer),
            framing.clone(),
            inbound_tx,
            Arc::clone(&state),
            Arc::clone(&metrics),
        ));

        let channel = Arc::new(Self {
            metadata,
            serializer,
            framing,
            writer: tokio::sync::Mutex::new(Box::new(write_half)),
            state,
            metrics,
            recv_task: parking_lot::Mutex::new(Some(recv_task)),
        });

        // The reader may already have hit end of stream; never revive it.
        channel.state.send_if_modified(|state| {
            if *state == CommunicationState::Connecting {
                *state = CommunicationState::Connected;
                true
            } else {
                false
            }
        });
        channel.metrics.record_connection_opened();

        debug!(
            transport_id = %channel.metadata.id,
            peer_addr = ?channel.metadata.peer_addr,
            serializer = channel.serializer.name(),
            "Communication channel opened"
        );

        (channel, inbound_rx)
    }

    /// Returns the transport metadata.
    pub fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> CommunicationState {
        *self.state.borrow()
    }

    /// Returns `true` while the channel is connected.
    pub fn is_connected(&self) -> bool {
        self.state() == CommunicationState::Connected
    }

    /// Subscribes to lifecycle state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<CommunicationState> {
        self.state.subscribe()
    }

    /// Resolves once the channel is disconnected.
    pub async fn closed(&self) {
        let mut state = self.state.subscribe();
        // The sender lives in `self`, so the wait cannot fail while borrowed.
        let _ = state
            .wait_for(|state| *state == CommunicationState::Disconnected)
            .await;
    }

    /// Frames and writes one message.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Serialization`] if the message cannot be
    /// encoded, or [`ChannelError::Transport`] if the write fails. A failed
    /// write disconnects the channel.
    pub async fn send_message(&self, message: &Message) -> Result<(), ChannelError> {
        if !self.is_connected() {
            debug!(
                transport_id = %self.metadata.id,
                correlation_id = message.correlation_id(),
                "Dropping {} on disconnected channel",
                message.kind()
            );
            return Ok(());
        }

        let payload = self.serializer.serialize(message)?;
        let frame = encode_frame(&payload, &self.framing.delimiter, self.framing.max_frame_size)?;

        let mut writer = self.writer.lock().await;
        // A concurrent writer may have failed while we waited for the lock.
        if !self.is_connected() {
            return Ok(());
        }

        let written = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                self.metrics.record_bytes_sent(frame.len() as u64);
                self.metrics.record_message_sent();
                Ok(())
            }
            Err(e) => {
                self.metrics.record_write_error();
                warn!(
                    transport_id = %self.metadata.id,
                    error = %e,
                    "Write failed, disconnecting channel"
                );
                Self::mark_disconnected(self.metadata.id, &self.state, &self.metrics);
                Err(ChannelError::Transport(TransportError::WriteFailed { source: e }))
            }
        }
    }

    /// Disconnects the channel and closes the write side of the socket.
    ///
    /// Idempotent. Shutdown errors are ignored; the peer may already be gone.
    pub async fn disconnect(&self) {
        if Self::mark_disconnected(self.metadata.id, &self.state, &self.metrics) {
            info!(transport_id = %self.metadata.id, "Channel disconnected locally");
        }
        if let Some(task) = self.recv_task.lock().take() {
            task.abort();
        }
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!(transport_id = %self.metadata.id, error = %e, "Ignoring shutdown error");
        }
    }

    /// Moves to `Disconnected`; returns `true` if this call made the change.
    fn mark_disconnected(
        transport_id: TransportId,
        state: &watch::Sender<CommunicationState>,
        metrics: &TransportMetrics,
    ) -> bool {
        let changed = state.send_if_modified(|state| {
            if *state == CommunicationState::Disconnected {
                false
            } else {
                *state = CommunicationState::Disconnected;
                true
            }
        });
        if changed {
            metrics.record_connection_closed();
            debug!(transport_id = %transport_id, "Channel state -> disconnected");
        }
        changed
    }

    /// Reads the socket, splits frames and forwards decoded messages.
    async fn receive_task<R>(
        transport_id: TransportId,
        mut reader: R,
        serializer: Arc<S>,
        framing: FramingConfig,
        inbound: mpsc::Sender<Message>,
        state: Arc<watch::Sender<CommunicationState>>,
        metrics: Arc<TransportMetrics>,
    ) where
        R: AsyncRead + Unpin,
    {
        let mut decoder = FrameDecoder::from_config(&framing);
        let mut buffer = vec![0u8; framing.read_buffer_size];

        'read: loop {
            let n = match reader.read(&mut buffer).await {
                Ok(0) => {
                    debug!(transport_id = %transport_id, "Peer closed the connection");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    metrics.record_read_error();
                    warn!(transport_id = %transport_id, error = %e, "Read failed");
                    break;
                }
            };
            metrics.record_bytes_received(n as u64);
            decoder.push(&buffer[..n]);

            loop {
                let frame = match decoder.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        metrics.record_frame_error();
                        error!(transport_id = %transport_id, error = %e, "Frame overflow, dropping connection");
                        break 'read;
                    }
                };

                match serializer.deserialize::<Message>(&frame) {
                    Ok(message) => {
                        metrics.record_message_received();
                        if inbound.send(message).await.is_err() {
                            debug!(transport_id = %transport_id, "Inbound receiver dropped");
                            break 'read;
                        }
                    }
                    Err(e) => {
                        // Delimiter framing stays in sync, so one bad frame is skipped.
                        metrics.record_frame_error();
                        warn!(
                            transport_id = %transport_id,
                            frame_size = frame.len(),
                            error = %e,
                            "Discarding undecodable frame"
                        );
                    }
                }
            }
        }

        Self::mark_disconnected(transport_id, &state, &metrics);
    }
}

#[async_trait]
impl<S: Serializer> MessageSink for CommunicationChannel<S> {
    fn transport_id(&self) -> TransportId {
        self.metadata.id
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.metadata.peer_addr
    }

    fn state(&self) -> CommunicationState {
        CommunicationChannel::state(self)
    }

    async fn send_message(&self, message: &Message) -> Result<(), ChannelError> {
        CommunicationChannel::send_message(self, message).await
    }
}

impl<S: Serializer> fmt::Debug for CommunicationChannel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommunicationChannel")
            .field("transport_id", &self.metadata.id)
            .field("peer_addr", &self.metadata.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

impl<S: Serializer> Drop for CommunicationChannel<S> {
    fn drop(&mut self) {
        if let Some(task) = self.recv_task.get_mut().take() {
            task.abort();
        }
    }
}
