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

//! Listener configuration.

use crate::transport::TransportError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default number of accept operations kept outstanding.
pub const DEFAULT_ACCEPT_PARALLELISM: usize = 4;

/// Default backlog slots per outstanding accept.
pub const DEFAULT_BACKLOG_MULTIPLIER: u32 = 16;

/// Configuration for a [`ConnectionListener`](crate::transport::ConnectionListener).
///
/// # Host selection
///
/// - `""`, `"any"` or `"*"`: listen on every IPv4 interface (`0.0.0.0`)
/// - a literal IP address: listen on exactly that address
/// - any other name: resolved, and the first IPv4 result is used
///
/// # Examples
///
/// ```rust
/// use scsrpc::transport::ListenerConfig;
///
/// let config = ListenerConfig::new("any", 9000)
///     .with_accept_parallelism(8)
///     .with_backlog_multiplier(32);
///
/// assert_eq!(config.backlog(), 256);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host name or address to bind.
    pub host: String,

    /// TCP port; 0 asks the OS for an ephemeral port.
    pub port: u16,

    /// Number of accept operations kept outstanding while listening.
    pub accept_parallelism: usize,

    /// Backlog slots per outstanding accept.
    pub backlog_multiplier: u32,

    /// Whether accepted sockets get TCP_NODELAY.
    pub nodelay: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 0,
            accept_parallelism: DEFAULT_ACCEPT_PARALLELISM,
            backlog_multiplier: DEFAULT_BACKLOG_MULTIPLIER,
            nodelay: true,
        }
    }
}

impl ListenerConfig {
    /// Creates a configuration for `host:port` with default tuning.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the number of concurrent accepts.
    pub fn with_accept_parallelism(mut self, count: usize) -> Self {
        self.accept_parallelism = count;
        self
    }

    /// Sets the backlog multiplier.
    pub fn with_backlog_multiplier(mut self, multiplier: u32) -> Self {
        self.backlog_multiplier = multiplier;
        self
    }

    /// Sets TCP_NODELAY for accepted sockets.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Returns the listen backlog: `backlog_multiplier * accept_parallelism`.
    pub fn backlog(&self) -> u32 {
        let parallelism = u32::try_from(self.accept_parallelism).unwrap_or(u32::MAX);
        self.backlog_multiplier.saturating_mul(parallelism)
    }

    /// Returns `true` if the host selects every interface.
    pub fn is_wildcard(&self) -> bool {
        let host = self.host.trim();
        host.is_empty() || host.eq_ignore_ascii_case("any") || host == "*"
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] if the accept
    /// parallelism or backlog multiplier is zero.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.accept_parallelism == 0 {
            return Err(TransportError::InvalidConfiguration {
                reason: "accept_parallelism must be greater than 0".to_string(),
            });
        }
        if self.backlog_multiplier == 0 {
            return Err(TransportError::InvalidConfiguration {
                reason: "backlog_multiplier must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the address the listener binds.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AddressResolution`] if a host name cannot be
    /// looked up or has no IPv4 address.
    pub async fn resolve(&self) -> Result<SocketAddr, TransportError> {
        if self.is_wildcard() {
            return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port));
        }

        let host = self.host.trim();
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }

        let addrs = tokio::net::lookup_host((host, self.port))
            .await
            .map_err(|e| TransportError::AddressResolution {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        addrs
            .into_iter()
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| TransportError::AddressResolution {
                host: host.to_string(),
                reason: "no IPv4 address".to_string(),
            })
    }
}
