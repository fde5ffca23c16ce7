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

//! Transport layer error types.
//!
//! Transport errors are the lowest level of the crate's error hierarchy and
//! represent failures of the underlying sockets: binding the listener,
//! accepting or establishing connections, and reading or writing bytes.
//!
//! # Error Categories
//!
//! - **Connection errors**: failed to establish, or lost, a connection
//! - **Listener errors**: bind, accept and address resolution failures
//! - **I/O errors**: read/write failures
//! - **Configuration errors**: invalid listener or framing configuration

use std::io;
use thiserror::Error;

/// Errors that can occur in the transport layer.
///
/// # Examples
///
/// ```rust
/// use scsrpc::transport::TransportError;
/// use std::io;
///
/// let error = TransportError::ConnectionFailed {
///     address: "127.0.0.1:8080".to_string(),
///     source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
/// };
///
/// if error.is_recoverable() {
///     println!("Can retry connection");
/// }
/// ```
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to establish a connection to the remote endpoint.
    #[error("failed to connect to {address}: {source}")]
    ConnectionFailed {
        /// The address that failed to connect
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Connection was lost during operation.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Description of why the connection was lost
        reason: String,
        /// The underlying I/O error, if available
        #[source]
        source: Option<io::Error>,
    },

    /// Failed to read from the socket.
    #[error("read failed: {source}")]
    ReadFailed {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Failed to write to the socket.
    #[error("write failed: {source}")]
    WriteFailed {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout {
        /// The duration that was exceeded
        duration: std::time::Duration,
    },

    /// Invalid listener or framing configuration.
    ///
    /// Not recoverable; indicates a programming or deployment error.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
    },

    /// The configured host name did not resolve to a usable IPv4 address.
    #[error("failed to resolve {host}: {reason}")]
    AddressResolution {
        /// The host name that was looked up
        host: String,
        /// Why resolution produced no usable address
        reason: String,
    },

    /// Transport is already closed.
    #[error("transport is closed")]
    Closed,

    /// Transport is not connected.
    #[error("transport is not connected")]
    NotConnected,

    /// Failed to bind to the specified address.
    ///
    /// Typically the port is in use or the process lacks permission.
    #[error("failed to bind to {address}: {source}")]
    BindFailed {
        /// The address that failed to bind
        address: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A single accept operation failed.
    ///
    /// The listener logs these and re-arms the accept; they never stop a
    /// running listener.
    #[error("accept failed: {source}")]
    AcceptFailed {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An unexpected I/O error occurred.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Returns `true` if this error is potentially recoverable by retrying.
    ///
    /// Recoverable errors include connection failures, lost connections,
    /// timeouts, failed accepts and transient I/O errors. Configuration,
    /// resolution and bind failures are not.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scsrpc::transport::TransportError;
    /// use std::io;
    ///
    /// let error = TransportError::AcceptFailed {
    ///     source: io::Error::new(io::ErrorKind::ConnectionAborted, "aborted"),
    /// };
    ///
    /// assert!(error.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::ConnectionFailed { .. }
            | TransportError::ConnectionLost { .. }
            | TransportError::Timeout { .. }
            | TransportError::AcceptFailed { .. }
            | TransportError::NotConnected => true,

            TransportError::ReadFailed { source }
            | TransportError::WriteFailed { source }
            | TransportError::Io { source } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),

            TransportError::InvalidConfiguration { .. }
            | TransportError::AddressResolution { .. }
            | TransportError::Closed
            | TransportError::BindFailed { .. } => false,
        }
    }

    /// Returns `true` if this error means the affected connection is unusable.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scsrpc::transport::TransportError;
    ///
    /// let error = TransportError::Closed;
    /// assert!(error.should_close_transport());
    /// ```
    pub fn should_close_transport(&self) -> bool {
        match self {
            TransportError::ConnectionLost { .. }
            | TransportError::Closed
            | TransportError::InvalidConfiguration { .. }
            | TransportError::Timeout { .. } => true,

            // These happen before a connection exists.
            TransportError::ConnectionFailed { .. }
            | TransportError::NotConnected
            | TransportError::BindFailed { .. }
            | TransportError::AcceptFailed { .. }
            | TransportError::AddressResolution { .. } => false,

            TransportError::ReadFailed { source }
            | TransportError::WriteFailed { source }
            | TransportError::Io { source } => !matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        TransportError::Io { source: error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_is_recoverable() {
        let error = TransportError::ConnectionFailed {
            address: "127.0.0.1:8080".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(error.is_recoverable());
        assert!(!error.should_close_transport());
    }

    #[test]
    fn test_accept_failed_keeps_listener_alive() {
        let error = TransportError::AcceptFailed {
            source: io::Error::new(io::ErrorKind::ConnectionReset, "reset"),
        };
        assert!(error.is_recoverable());
        assert!(!error.should_close_transport());
    }

    #[test]
    fn test_resolution_and_configuration_not_recoverable() {
        let error = TransportError::AddressResolution {
            host: "nowhere.invalid".to_string(),
            reason: "no IPv4 address".to_string(),
        };
        assert!(!error.is_recoverable());

        let error = TransportError::InvalidConfiguration {
            reason: "accept_parallelism must be greater than 0".to_string(),
        };
        assert!(!error.is_recoverable());
        assert!(error.should_close_transport());
    }

    #[test]
    fn test_transient_io_error_is_recoverable() {
        let error = TransportError::ReadFailed {
            source: io::Error::new(io::ErrorKind::Interrupted, "interrupted"),
        };
        assert!(error.is_recoverable());
        assert!(!error.should_close_transport());
    }

    #[test]
    fn test_permanent_io_error_closes_transport() {
        let error = TransportError::WriteFailed {
            source: io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"),
        };
        assert!(!error.is_recoverable());
        assert!(error.should_close_transport());
    }

    #[test]
    fn test_display_includes_address() {
        let error = TransportError::BindFailed {
            address: "0.0.0.0:9000".to_string(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(error.to_string().contains("0.0.0.0:9000"));
    }
}
