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

//! TCP RPC server wiring the listener, channels and dispatcher together.

use crate::channel::{CommunicationChannel, Message, MessageSink};
use crate::dispatch::{CallEvent, CallerContext, DispatcherConfig, Invoker, ServiceChannel};
use crate::error::ScsError;
use crate::observability::{CallMetrics, StatusCounter, TransportMetrics};
use crate::serialization::framing::FramingConfig;
use crate::transport::{AcceptedChannel, ConnectionListener, ListenerConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};

/// Configuration of an [`ScsServer`].
///
/// # Examples
///
/// ```rust
/// use scsrpc::ServerConfig;
///
/// let json = r#"{
///     "listener": { "host": "any", "port": 8888, "accept_parallelism": 8 },
///     "dispatcher": { "timeout_secs": 10, "max_caller": 200 }
/// }"#;
///
/// let config: ServerConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.listener.port, 8888);
/// assert_eq!(config.dispatcher.max_caller, 200);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Where and how to accept connections.
    pub listener: ListenerConfig,
    /// Frame delimiter and limits.
    pub framing: FramingConfig,
    /// Timeout and concurrency of calls.
    pub dispatcher: DispatcherConfig,
}

impl ServerConfig {
    /// Creates a configuration listening on `host:port` with defaults
    /// elsewhere.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            listener: ListenerConfig::new(host, port),
            ..Self::default()
        }
    }

    /// Replaces the listener configuration.
    pub fn with_listener(mut self, listener: ListenerConfig) -> Self {
        self.listener = listener;
        self
    }

    /// Replaces the framing configuration.
    pub fn with_framing(mut self, framing: FramingConfig) -> Self {
        self.framing = framing;
        self
    }

    /// Replaces the dispatcher configuration.
    pub fn with_dispatcher(mut self, dispatcher: DispatcherConfig) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first section's validation error.
    pub fn validate(&self) -> Result<(), ScsError> {
        self.listener.validate()?;
        self.framing.validate()?;
        self.dispatcher.validate()?;
        Ok(())
    }
}

/// A running (or startable) RPC server.
///
/// Every accepted connection gets its own task reading requests. Each
/// request is dispatched on a task of its own, so a slow call never holds up
/// the next frame on the same connection; answers may therefore leave in a
/// different order than the requests arrived.
///
/// # Examples
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use scsrpc::channel::{CommunicationState, ResultMessage};
/// use scsrpc::dispatch::{CallerContext, InvokeError, Invoker};
/// use scsrpc::{ScsServer, ServerConfig};
/// use std::sync::Arc;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Invoker for Echo {
///     async fn invoke(
///         &self,
///         _state: CommunicationState,
///         ctx: &mut CallerContext,
///     ) -> Result<Option<ResultMessage>, InvokeError> {
///         let params = ctx.request.parameters.clone();
///         Ok(Some(ResultMessage::for_request(&ctx.request).with_value(params)))
///     }
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let server = ScsServer::new(ServerConfig::new("127.0.0.1", 8888), Arc::new(Echo))?;
/// server.start().await?;
/// println!("listening on {:?}", server.local_addr());
/// server.stop();
/// # Ok(())
/// # }
/// ```
pub struct ScsServer {
    config: ServerConfig,
    listener: ConnectionListener,
    dispatcher: parking_lot::Mutex<Arc<ServiceChannel>>,
    status: Arc<StatusCounter>,
    transport_metrics: Arc<TransportMetrics>,
    call_metrics: Arc<CallMetrics>,
    acceptor: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ScsServer {
    /// Creates a stopped server.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(config: ServerConfig, invoker: Arc<dyn Invoker>) -> Result<Self, ScsError> {
        config.validate()?;

        let status = Arc::new(StatusCounter::new());
        let transport_metrics = Arc::new(TransportMetrics::new());
        let call_metrics = Arc::new(CallMetrics::new());
        let dispatcher = ServiceChannel::new(config.dispatcher.clone(), invoker)?
            .with_status_recorder(status.clone())
            .with_metrics(Arc::clone(&call_metrics));
        let listener = ConnectionListener::new(
            config.listener.clone(),
            config.framing.clone(),
            Arc::clone(&transport_metrics),
        );

        Ok(Self {
            config,
            listener,
            dispatcher: parking_lot::Mutex::new(Arc::new(dispatcher)),
            status,
            transport_metrics,
            call_metrics,
            acceptor: parking_lot::Mutex::new(None),
        })
    }

    /// Starts listening and serving.
    ///
    /// A server that was stopped gets a fresh dispatcher, sharing the
    /// previous one's statistics and subscribers.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be started.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), ScsError> {
        let accepted = self.listener.start().await?;
        let dispatcher = {
            let mut current = self.dispatcher.lock();
            if current.gate().is_closed() {
                debug!("Reopening dispatcher after stop");
                *current = Arc::new(current.reopened());
            }
            Arc::clone(&current)
        };
        let task = tokio::spawn(accept_connections(accepted, dispatcher));
        if let Some(previous) = self.acceptor.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    /// Stops the server.
    ///
    /// Stops accepting, closes the dispatcher to new calls and aborts every
    /// connection task. Calls already admitted finish, but their answers
    /// are dropped once their connection is gone.
    pub fn stop(&self) {
        self.listener.stop();
        self.dispatcher.lock().shutdown();
        if let Some(task) = self.acceptor.lock().take() {
            task.abort();
        }
        info!("Server stopped");
    }

    /// Returns `true` while listening.
    pub fn is_running(&self) -> bool {
        self.listener.is_running()
    }

    /// Address actually bound, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the dispatcher currently serving calls.
    pub fn dispatcher(&self) -> Arc<ServiceChannel> {
        Arc::clone(&self.dispatcher.lock())
    }

    /// Per-method call statistics.
    pub fn status(&self) -> &Arc<StatusCounter> {
        &self.status
    }

    /// Connection and byte counters.
    pub fn transport_metrics(&self) -> &Arc<TransportMetrics> {
        &self.transport_metrics
    }

    /// Call counters.
    pub fn call_metrics(&self) -> &Arc<CallMetrics> {
        &self.call_metrics
    }

    /// Subscribes to per-call events.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.dispatcher.lock().subscribe()
    }
}

impl std::fmt::Debug for ScsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScsServer")
            .field("listener", &self.listener)
            .field("dispatcher", &*self.dispatcher.lock())
            .finish_non_exhaustive()
    }
}

impl Drop for ScsServer {
    fn drop(&mut self) {
        if let Some(task) = self.acceptor.get_mut().take() {
            task.abort();
        }
    }
}

/// Owns every connection task; aborting this task aborts them all.
async fn accept_connections(
    mut accepted: mpsc::UnboundedReceiver<AcceptedChannel>,
    dispatcher: Arc<ServiceChannel>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            next = accepted.recv() => match next {
                Some(connection) => {
                    connections.spawn(serve_connection(connection, Arc::clone(&dispatcher)));
                }
                None => break,
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
    // Listener stopped; keep serving the connections already open.
    while connections.join_next().await.is_some() {}
}

async fn serve_connection(connection: AcceptedChannel, dispatcher: Arc<ServiceChannel>) {
    let AcceptedChannel {
        channel,
        mut inbound,
        peer_addr,
    } = connection;
    let transport_id = channel.metadata().id;
    info!(%transport_id, %peer_addr, "Connection accepted");

    while let Some(message) = inbound.recv().await {
        match message {
            Message::Request(request) => {
                let ctx = CallerContext::new(request, Some(peer_addr));
                tokio::spawn(dispatch(Arc::clone(&dispatcher), Arc::clone(&channel), ctx));
            }
            other => {
                debug!(%transport_id, kind = other.kind(), "Ignoring non-request message");
            }
        }
    }

    channel.disconnect().await;
    info!(%transport_id, %peer_addr, "Connection closed");
}

async fn dispatch(
    dispatcher: Arc<ServiceChannel>,
    channel: Arc<CommunicationChannel>,
    ctx: CallerContext,
) {
    let sink: Arc<dyn MessageSink> = channel.clone();
    if let Err(e) = dispatcher.send_response(sink, ctx).await {
        warn!(transport_id = %channel.metadata().id, error = %e, "Dispatch failed");
        if e.is_connection_fault() {
            channel.disconnect().await;
        }
    }
}
