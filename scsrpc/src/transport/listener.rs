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

//! TCP connection listener.
//!
//! The listener keeps a fixed number of accept operations outstanding. Each
//! accept task re-arms immediately after a connection is handed off, and
//! after a failed accept as well, for as long as the listener is running.
//! Accepted sockets are wrapped in a [`CommunicationChannel`] and delivered
//! through the receiver returned from [`ConnectionListener::start`].

use super::{ListenerConfig, TcpTransport, TransportError};
use crate::channel::{CommunicationChannel, Message};
use crate::observability::TransportMetrics;
use crate::serialization::JsonSerializer;
use crate::serialization::framing::FramingConfig;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Pause after a failed accept before re-arming.
///
/// Keeps a persistent failure such as descriptor exhaustion from spinning.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Where the accept tasks take connections from.
#[async_trait]
pub(crate) trait Acceptor: Send + Sync + 'static {
    /// Waits for the next inbound connection.
    async fn next_connection(&self) -> Result<(TcpTransport, SocketAddr), TransportError>;
}

#[async_trait]
impl Acceptor for TcpListener {
    async fn next_connection(&self) -> Result<(TcpTransport, SocketAddr), TransportError> {
        TcpTransport::accept(self).await
    }
}

/// A connection accepted by a [`ConnectionListener`].
#[derive(Debug)]
pub struct AcceptedChannel {
    /// The framed channel over the accepted socket.
    pub channel: Arc<CommunicationChannel>,
    /// Messages decoded from the socket.
    pub inbound: mpsc::Receiver<Message>,
    /// Remote address of the socket.
    pub peer_addr: SocketAddr,
}

/// Accepts TCP connections and wraps them into communication channels.
///
/// # Examples
///
/// ```rust,no_run
/// use scsrpc::observability::TransportMetrics;
/// use scsrpc::serialization::framing::FramingConfig;
/// use scsrpc::transport::{ConnectionListener, ListenerConfig};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let listener = ConnectionListener::new(
///     ListenerConfig::new("127.0.0.1", 9000),
///     FramingConfig::default(),
///     Arc::new(TransportMetrics::new()),
/// );
///
/// let mut accepted = listener.start().await?;
/// while let Some(connection) = accepted.recv().await {
///     println!("connection from {}", connection.peer_addr);
/// }
/// listener.stop();
/// # Ok(())
/// # }
/// ```
pub struct ConnectionListener {
    config: ListenerConfig,
    framing: FramingConfig,
    metrics: Arc<TransportMetrics>,
    running: Arc<AtomicBool>,
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionListener {
    /// Creates a stopped listener.
    pub fn new(
        config: ListenerConfig,
        framing: FramingConfig,
        metrics: Arc<TransportMetrics>,
    ) -> Self {
        Self {
            config,
            framing,
            metrics,
            running: Arc::new(AtomicBool::new(false)),
            local_addr: parking_lot::Mutex::new(None),
            tasks: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Binds the configured address and starts the accept tasks.
    ///
    /// # Errors
    ///
    /// - [`TransportError::InvalidConfiguration`] if the listener is already
    ///   running or the configuration does not validate
    /// - [`TransportError::AddressResolution`] if the host does not resolve
    /// - [`TransportError::BindFailed`] if the socket cannot be bound
    #[instrument(skip(self), fields(host = %self.config.host, port = self.config.port))]
    pub async fn start(&self) -> Result<mpsc::UnboundedReceiver<AcceptedChannel>, TransportError> {
        if self.is_running() {
            return Err(TransportError::InvalidConfiguration {
                reason: "listener is already running".to_string(),
            });
        }
        self.config.validate()?;
        self.framing.validate()?;

        let addr = self.config.resolve().await?;
        let listener = Arc::new(TcpTransport::bind(addr, self.config.backlog()).await?);
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Io { source: e })?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.running.store(true, Ordering::Release);
        *self.local_addr.lock() = Some(local_addr);

        let mut tasks = self.tasks.lock();
        for slot in 0..self.config.accept_parallelism {
            tasks.push(tokio::spawn(accept_loop(
                slot,
                Arc::clone(&listener),
                tx.clone(),
                Arc::clone(&self.running),
                self.framing.clone(),
                Arc::clone(&self.metrics),
                self.config.nodelay,
            )));
        }

        info!(
            %local_addr,
            accept_parallelism = self.config.accept_parallelism,
            backlog = self.config.backlog(),
            "Listener started"
        );
        Ok(rx)
    }

    /// Stops accepting and closes the listening socket.
    ///
    /// Channels already accepted stay open. Never fails; calling it on a
    /// stopped listener does nothing.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        if let Some(addr) = self.local_addr.lock().take() {
            info!(local_addr = %addr, "Listener stopped");
        }
    }

    /// Returns `true` while accepting.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Address actually bound, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }
}

impl std::fmt::Debug for ConnectionListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionListener")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

impl Drop for ConnectionListener {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop<A: Acceptor>(
    slot: usize,
    listener: Arc<A>,
    accepted: mpsc::UnboundedSender<AcceptedChannel>,
    running: Arc<AtomicBool>,
    framing: FramingConfig,
    metrics: Arc<TransportMetrics>,
    nodelay: bool,
) {
    debug!(slot, "Accept task started");

    while running.load(Ordering::Acquire) {
        match listener.next_connection().await {
            Ok((transport, peer_addr)) => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                if let Err(e) = transport.set_nodelay(nodelay) {
                    debug!(%peer_addr, error = %e, "Failed to set TCP_NODELAY");
                }

                let (channel, inbound) = CommunicationChannel::open_with(
                    transport,
                    JsonSerializer::default(),
                    framing.clone(),
                    Arc::clone(&metrics),
                );

                let connection = AcceptedChannel {
                    channel,
                    inbound,
                    peer_addr,
                };
                if accepted.send(connection).is_err() {
                    info!(slot, "Accept receiver dropped, terminating accept task");
                    break;
                }
            }
            Err(e) => {
                metrics.record_accept_error();
                warn!(slot, error = %e, "Accept failed, re-arming");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }

    debug!(slot, "Accept task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{CommunicationState, RequestMessage};
    use std::io;
    use std::sync::atomic::AtomicUsize;

    /// Fails the first `failures` accepts, then defers to a real socket.
    struct FlakyAcceptor {
        inner: TcpListener,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl Acceptor for FlakyAcceptor {
        async fn next_connection(&self) -> Result<(TcpTransport, SocketAddr), TransportError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(TransportError::AcceptFailed {
                    source: io::Error::other("too many open files"),
                });
            }
            self.inner.next_connection().await
        }
    }

    fn listener() -> ConnectionListener {
        ConnectionListener::new(
            ListenerConfig::new("127.0.0.1", 0).with_accept_parallelism(2),
            FramingConfig::default(),
            Arc::new(TransportMetrics::new()),
        )
    }

    #[tokio::test]
    async fn test_accepts_and_frames_messages() {
        let listener = listener();
        let mut accepted = listener.start().await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(listener.is_running());

        let client = TcpTransport::connect(addr.to_string()).await.unwrap();
        let (client, _client_inbound) = CommunicationChannel::open(client, FramingConfig::default());

        let mut connection = accepted.recv().await.unwrap();
        assert!(connection.channel.is_connected());

        client
            .send_message(&Message::from(RequestMessage::new(1, "Orders", "Find")))
            .await
            .unwrap();
        let message = connection.inbound.recv().await.unwrap();
        assert_eq!(message.correlation_id(), 1);

        listener.stop();
    }

    #[tokio::test]
    async fn test_accept_tasks_rearm() {
        let listener = listener();
        let mut accepted = listener.start().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut clients = Vec::new();
        for _ in 0..5 {
            clients.push(TcpTransport::connect(addr.to_string()).await.unwrap());
        }

        let mut peers = Vec::new();
        for _ in 0..5 {
            let connection = accepted.recv().await.unwrap();
            assert_eq!(connection.channel.state(), CommunicationState::Connected);
            peers.push(connection.peer_addr);
        }
        peers.sort();
        peers.dedup();
        assert_eq!(peers.len(), 5);

        listener.stop();
    }

    #[tokio::test]
    async fn test_failed_accepts_do_not_stop_the_slot() {
        let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = inner.local_addr().unwrap();
        let acceptor = Arc::new(FlakyAcceptor {
            inner,
            failures: AtomicUsize::new(2),
        });
        let metrics = Arc::new(TransportMetrics::new());
        let running = Arc::new(AtomicBool::new(true));
        let (tx, mut accepted) = mpsc::unbounded_channel();

        // A single slot: if a failure ended it, nothing would be accepted.
        let task = tokio::spawn(accept_loop(
            0,
            acceptor,
            tx,
            Arc::clone(&running),
            FramingConfig::default(),
            Arc::clone(&metrics),
            true,
        ));

        let _client = TcpTransport::connect(addr.to_string()).await.unwrap();
        let connection = tokio::time::timeout(Duration::from_secs(5), accepted.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(connection.channel.is_connected());
        assert_eq!(metrics.total_accept_errors(), 2);

        let _second = TcpTransport::connect(addr.to_string()).await.unwrap();
        let connection = tokio::time::timeout(Duration::from_secs(5), accepted.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(connection.channel.is_connected());
        assert_eq!(metrics.total_accept_errors(), 2);

        running.store(false, Ordering::Release);
        task.abort();
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let listener = listener();
        let _accepted = listener.start().await.unwrap();
        assert!(matches!(
            listener.start().await,
            Err(TransportError::InvalidConfiguration { .. })
        ));
        listener.stop();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_restartable() {
        let listener = listener();
        listener.stop();
        assert!(!listener.is_running());

        let _first = listener.start().await.unwrap();
        listener.stop();
        listener.stop();
        assert!(!listener.is_running());
        assert!(listener.local_addr().is_none());

        let _second = listener.start().await.unwrap();
        assert!(listener.is_running());
        listener.stop();
    }

    #[tokio::test]
    async fn test_stopped_listener_refuses_connections() {
        let listener = listener();
        let _accepted = listener.start().await.unwrap();
        let addr = listener.local_addr().unwrap();
        listener.stop();

        // Aborted accept tasks drop the last reference to the socket.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(TcpTransport::connect(addr.to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_to_start() {
        let listener = ConnectionListener::new(
            ListenerConfig::new("127.0.0.1", 0).with_accept_parallelism(0),
            FramingConfig::default(),
            Arc::new(TransportMetrics::new()),
        );
        assert!(listener.start().await.is_err());
        assert!(!listener.is_running());
    }
}
