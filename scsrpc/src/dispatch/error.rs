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

//! Dispatcher error types.

use crate::channel::ChannelError;
use thiserror::Error;

/// Boxed error returned by collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced to the caller of
/// [`ServiceChannel::send_response`](super::ServiceChannel::send_response).
///
/// Timeouts and invocation faults are not errors here: they become
/// synthesized results sent to the peer.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher was shut down; no further calls are admitted.
    #[error("dispatcher is shut down, concurrency gate closed")]
    GateClosed,

    /// The answer could not be written to the connection.
    ///
    /// The connection is assumed compromised; the send is not retried.
    #[error("sending message ({service}, {method}) error: {source}")]
    SendFailed {
        /// Service that was called
        service: String,
        /// Method that was called
        method: String,
        /// Underlying channel failure
        #[source]
        source: ChannelError,
    },
}

impl DispatchError {
    /// Returns `true` if the connection that produced this error is unusable.
    pub fn is_connection_fault(&self) -> bool {
        match self {
            Self::GateClosed => false,
            Self::SendFailed { source, .. } => source.is_fatal(),
        }
    }
}

/// Failure of an [`Invoker`](super::Invoker) to produce a result.
///
/// The dispatcher never forwards this to the peer: a faulted invocation is
/// answered exactly like one that did not finish in time.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct InvokeError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl InvokeError {
    /// Creates an error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error with a message and an underlying cause.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
