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

//! Channel layer for SCSRPC.
//!
//! A channel turns one connected transport into a stream of typed
//! [`Message`]s. The layer consists of:
//!
//! - [`Message`] and its payload types: the wire protocol
//! - [`CommunicationChannel`]: framing, lifecycle and serialized sends for
//!   one connection
//! - [`MessageSink`]: the outbound seam the dispatcher writes answers to
//! - [`CorrelationIdGenerator`] and [`PendingRequests`]: caller-side
//!   request/answer pairing
//! - [`ChannelError`]: failures of this layer
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──► Connected ──► Disconnected
//! ```
//!
//! `Disconnected` is terminal and is reached on end of stream, any read or
//! write fault, a frame exceeding the size limit, or a local
//! [`disconnect`](CommunicationChannel::disconnect).
//!
//! # Ordering
//!
//! Frames on one connection are delivered to the inbound receiver in arrival
//! order. Answers may be sent in any order; callers pair them to requests by
//! correlation id only.

#[allow(clippy::module_inception)]
mod channel;
mod correlation;
mod error;
mod message;
mod pending;

pub use channel::{CommunicationChannel, CommunicationState, INBOUND_BUFFER_SIZE, MessageSink};
pub use correlation::CorrelationIdGenerator;
pub use error::ChannelError;
pub use message::{Message, RemoteError, RemoteErrorKind, RequestMessage, ResultMessage};
pub use pending::PendingRequests;
