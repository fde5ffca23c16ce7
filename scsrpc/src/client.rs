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

//! Caller side of the protocol.

use crate::channel::{
    CommunicationChannel, CorrelationIdGenerator, Message, PendingRequests, RequestMessage,
    ResultMessage,
};
use crate::dispatch::DEFAULT_TIMEOUT_SECS;
use crate::error::ScsError;
use crate::serialization::framing::FramingConfig;
use crate::transport::TcpTransport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Configuration of a [`ServiceClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address, `host:port`.
    pub address: String,
    /// How long a call waits for its answer.
    pub timeout_secs: u64,
    /// Name reported to the server as the calling application.
    pub app_name: String,
    /// Host name reported to the server.
    pub host_name: String,
    /// Frame delimiter and limits; must match the server's.
    pub framing: FramingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            app_name: String::new(),
            host_name: String::new(),
            framing: FramingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for `address` with defaults elsewhere.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Sets the call timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the reported application and host names.
    pub fn with_caller(mut self, app_name: impl Into<String>, host_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self.host_name = host_name.into();
        self
    }

    /// Sets the framing configuration.
    pub fn with_framing(mut self, framing: FramingConfig) -> Self {
        self.framing = framing;
        self
    }

    /// Returns the call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// An answer received by a [`ServiceClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientReply {
    /// A structured result.
    Result(ResultMessage),
    /// Pre-encoded bytes produced by the server.
    RawData(Vec<u8>),
}

impl ClientReply {
    /// Returns the structured result, if that is what arrived.
    pub fn into_result(self) -> Option<ResultMessage> {
        match self {
            Self::Result(result) => Some(result),
            Self::RawData(_) => None,
        }
    }
}

/// A connection to a server, shareable across tasks.
///
/// Calls are pipelined: many may be outstanding on the one connection, and
/// answers are matched to calls by correlation id.
///
/// # Examples
///
/// ```rust,no_run
/// use scsrpc::{ClientConfig, ServiceClient};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ServiceClient::connect(ClientConfig::new("127.0.0.1:8888")).await?;
/// let reply = client.call("Orders", "Find", json!({"id": 7})).await?;
/// println!("{:?}", reply);
/// client.close().await;
/// # Ok(())
/// # }
/// ```
pub struct ServiceClient {
    config: ClientConfig,
    channel: Arc<CommunicationChannel>,
    pending: Arc<PendingRequests<ClientReply>>,
    ids: CorrelationIdGenerator,
    router: JoinHandle<()>,
}

impl ServiceClient {
    /// Connects to the configured server.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the connection
    /// cannot be established.
    #[instrument(skip(config), fields(address = %config.address))]
    pub async fn connect(config: ClientConfig) -> Result<Self, ScsError> {
        config.framing.validate()?;
        let transport = TcpTransport::connect(config.address.clone()).await?;
        if let Err(e) = transport.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        let (channel, inbound) = CommunicationChannel::open(transport, config.framing.clone());
        let pending = Arc::new(PendingRequests::new());
        let router = tokio::spawn(route_replies(inbound, Arc::clone(&pending)));

        Ok(Self {
            config,
            channel,
            pending,
            ids: CorrelationIdGenerator::new(),
            router,
        })
    }

    /// Calls `service.method` with `parameters`.
    ///
    /// # Errors
    ///
    /// - [`ScsError::Timeout`] if no answer arrives in time
    /// - [`ScsError::Disconnected`] if the connection is or becomes closed
    /// - [`ScsError::Channel`] if the request cannot be written
    pub async fn call(
        &self,
        service: &str,
        method: &str,
        parameters: Value,
    ) -> Result<ClientReply, ScsError> {
        let request = RequestMessage::new(0, service, method).with_parameters(parameters);
        self.send_request(request).await
    }

    /// Sends a prepared request; its correlation id is replaced with a fresh
    /// one, and an empty caller identity is filled from the configuration.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    pub async fn send_request(&self, mut request: RequestMessage) -> Result<ClientReply, ScsError> {
        let correlation_id = self.ids.next();
        request.correlation_id = correlation_id;
        if request.app_name.is_empty() {
            request.app_name = self.config.app_name.clone();
        }
        if request.host_name.is_empty() {
            request.host_name = self.config.host_name.clone();
        }

        let reply = self.pending.register(correlation_id);
        if let Err(e) = self.channel.send_message(&Message::Request(request)).await {
            self.pending.cancel(correlation_id);
            return Err(e.into());
        }
        // Sends on a closed channel are dropped without error.
        if !self.channel.is_connected() {
            self.pending.cancel(correlation_id);
            return Err(ScsError::Disconnected { correlation_id });
        }

        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, reply).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ScsError::Disconnected { correlation_id }),
            Err(_) => {
                self.pending.cancel(correlation_id);
                Err(ScsError::Timeout {
                    correlation_id,
                    timeout,
                })
            }
        }
    }

    /// Returns `true` while the connection is up.
    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Number of calls awaiting an answer.
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    /// Closes the connection. Outstanding calls fail with
    /// [`ScsError::Disconnected`].
    pub async fn close(&self) {
        self.channel.disconnect().await;
        self.pending.fail_all();
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("address", &self.config.address)
            .field("channel", &self.channel)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Drop for ServiceClient {
    fn drop(&mut self) {
        self.router.abort();
    }
}

async fn route_replies(
    mut inbound: mpsc::Receiver<Message>,
    pending: Arc<PendingRequests<ClientReply>>,
) {
    while let Some(message) = inbound.recv().await {
        let (correlation_id, reply) = match message {
            Message::Result(result) => (result.correlation_id, ClientReply::Result(result)),
            Message::RawData {
                correlation_id,
                data,
            } => (correlation_id, ClientReply::RawData(data)),
            other => {
                debug!(kind = other.kind(), "Ignoring unsolicited message");
                continue;
            }
        };
        if !pending.complete(correlation_id, reply) {
            debug!(correlation_id, "Answer for unknown or expired call dropped");
        }
    }

    let released = pending.fail_all();
    if released > 0 {
        warn!(released, "Connection closed with calls outstanding");
    }
}
