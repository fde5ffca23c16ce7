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

//! Top-level error type.
//!
//! Errors are layered the same way the crate is:
//!
//! 1. **Transport**: socket failures ([`TransportError`])
//! 2. **Channel**: framing and encoding failures ([`ChannelError`])
//! 3. **Dispatch**: admission and response delivery ([`DispatchError`])
//!
//! [`ScsError`] composes them and adds the failures only a caller can see:
//! a call that got no answer in time, or a connection that dropped while
//! calls were outstanding.
//!
//! # Examples
//!
//! ```rust
//! use scsrpc::ScsError;
//! use scsrpc::transport::TransportError;
//!
//! let error: ScsError = TransportError::Closed.into();
//! assert!(error.is_transport_error());
//! assert!(error.should_close_connection());
//! ```

use crate::channel::ChannelError;
use crate::dispatch::DispatchError;
use crate::transport::TransportError;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Top-level error type for scsrpc operations.
#[derive(Debug)]
pub enum ScsError {
    /// A transport-layer error occurred.
    Transport(TransportError),

    /// A channel-layer error occurred.
    Channel(ChannelError),

    /// Dispatching a request failed.
    Dispatch(DispatchError),

    /// No answer arrived within the client-side timeout.
    ///
    /// The call may still complete on the server; its answer is discarded.
    Timeout {
        /// Id of the unanswered request
        correlation_id: u64,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// The connection closed before the answer arrived.
    Disconnected {
        /// Id of the unanswered request
        correlation_id: u64,
    },
}

impl ScsError {
    /// Returns `true` for transport-layer errors.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` for channel-layer errors.
    pub fn is_channel_error(&self) -> bool {
        matches!(self, Self::Channel(_))
    }

    /// Returns `true` for client-side timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the connection cannot be used after this error.
    pub fn should_close_connection(&self) -> bool {
        match self {
            Self::Transport(e) => e.should_close_transport(),
            Self::Channel(e) => e.is_fatal(),
            Self::Dispatch(e) => e.is_connection_fault(),
            Self::Timeout { .. } => false,
            Self::Disconnected { .. } => true,
        }
    }
}

impl fmt::Display for ScsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Channel(e) => write!(f, "Channel error: {}", e),
            Self::Dispatch(e) => write!(f, "Dispatch error: {}", e),
            Self::Timeout {
                correlation_id,
                timeout,
            } => write!(
                f,
                "Call {} got no answer within {:?}",
                correlation_id, timeout
            ),
            Self::Disconnected { correlation_id } => {
                write!(f, "Connection closed before call {} was answered", correlation_id)
            }
        }
    }
}

impl StdError for ScsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Channel(e) => Some(e),
            Self::Dispatch(e) => Some(e),
            Self::Timeout { .. } | Self::Disconnected { .. } => None,
        }
    }
}

impl From<TransportError> for ScsError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

impl From<ChannelError> for ScsError {
    fn from(error: ChannelError) -> Self {
        Self::Channel(error)
    }
}

impl From<DispatchError> for ScsError {
    fn from(error: DispatchError) -> Self {
        Self::Dispatch(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportId;
    use std::io;

    #[test]
    fn test_layer_classification() {
        let transport: ScsError = TransportError::Closed.into();
        assert!(transport.is_transport_error());
        assert!(!transport.is_channel_error());
        assert!(transport.source().is_some());

        let channel: ScsError = ChannelError::Closed {
            transport_id: TransportId::new(3),
        }
        .into();
        assert!(channel.is_channel_error());
        assert!(channel.should_close_connection());
    }

    #[test]
    fn test_timeout_keeps_connection() {
        let error = ScsError::Timeout {
            correlation_id: 12,
            timeout: Duration::from_secs(2),
        };
        assert!(error.is_timeout());
        assert!(!error.should_close_connection());
        assert!(error.to_string().contains("12"));
        assert!(error.source().is_none());
    }

    #[test]
    fn test_dispatch_send_failure_closes_connection() {
        let error: ScsError = DispatchError::SendFailed {
            service: "Orders".to_string(),
            method: "Find".to_string(),
            source: ChannelError::Transport(TransportError::WriteFailed {
                source: io::Error::new(io::ErrorKind::BrokenPipe, "gone"),
            }),
        }
        .into();
        assert!(error.should_close_connection());
        assert!(error.to_string().contains("(Orders, Find)"));
    }
}
