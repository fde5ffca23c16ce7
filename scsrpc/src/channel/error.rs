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

//! Error types for the channel layer.

use crate::serialization::{DeserializationError, SerializationError};
use crate::transport::{TransportError, TransportId};
use std::fmt;

/// Errors that can occur on a [`CommunicationChannel`](super::CommunicationChannel).
#[derive(Debug)]
pub enum ChannelError {
    /// The channel is closed and cannot be used.
    Closed {
        /// The transport behind the closed channel.
        transport_id: TransportId,
    },

    /// A message could not be encoded into a frame.
    Serialization(SerializationError),

    /// A frame could not be decoded into a message.
    Deserialization(DeserializationError),

    /// The socket failed while reading or writing.
    Transport(TransportError),
}

impl ChannelError {
    /// Returns true if this error indicates the channel is closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns true if the connection can no longer be used after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Closed { .. } => true,
            Self::Transport(error) => error.should_close_transport(),
            Self::Serialization(_) | Self::Deserialization(_) => false,
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed { transport_id } => {
                write!(f, "Channel on {} is closed", transport_id)
            }
            Self::Serialization(error) => write!(f, "Channel encode failed: {}", error),
            Self::Deserialization(error) => write!(f, "Channel decode failed: {}", error),
            Self::Transport(error) => write!(f, "Channel transport failed: {}", error),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Closed { .. } => None,
            Self::Serialization(error) => Some(error),
            Self::Deserialization(error) => Some(error),
            Self::Transport(error) => Some(error),
        }
    }
}

impl From<SerializationError> for ChannelError {
    fn from(error: SerializationError) -> Self {
        Self::Serialization(error)
    }
}

impl From<DeserializationError> for ChannelError {
    fn from(error: DeserializationError) -> Self {
        Self::Deserialization(error)
    }
}

impl From<TransportError> for ChannelError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}
