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

//! # scsrpc - Delimiter-Framed TCP RPC
//!
//! scsrpc serves remote method calls over plain TCP. Every message is a
//! serialized envelope followed by a delimiter; the receiving side splits
//! the byte stream at the delimiter, even when it straddles two reads.
//!
//! - **Bounded concurrency**: at most `max_caller` calls run at once
//! - **Per-call timeouts**: a call that does not finish in time is answered
//!   with a timeout error instead of hanging its caller
//! - **Pipelining**: many calls may be outstanding on one connection;
//!   answers are matched by correlation id, not by order
//! - **Observability**: structured `tracing` logs, per-method statistics
//!   and optional `metrics` counters (`observability` feature)
//!
//! ## Architecture
//!
//! - **[`serialization`]**: delimiter search, framing and payload encoding
//! - **[`transport`]**: TCP and in-memory byte streams, the connection
//!   listener
//! - **[`channel`]**: framed message channels and the message protocol
//! - **[`dispatch`]**: the per-request dispatcher and its collaborators
//! - **[`observability`]**: counters and call statistics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use scsrpc::channel::{CommunicationState, ResultMessage};
//! use scsrpc::dispatch::{CallerContext, InvokeError, Invoker};
//! use scsrpc::{ClientConfig, ScsServer, ServerConfig, ServiceClient};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Invoker for Echo {
//!     async fn invoke(
//!         &self,
//!         _state: CommunicationState,
//!         ctx: &mut CallerContext,
//!     ) -> Result<Option<ResultMessage>, InvokeError> {
//!         let params = ctx.request.parameters.clone();
//!         Ok(Some(ResultMessage::for_request(&ctx.request).with_value(params)))
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = ScsServer::new(ServerConfig::new("127.0.0.1", 0), Arc::new(Echo))?;
//! server.start().await?;
//! let addr = server.local_addr().ok_or("not listening")?;
//!
//! let client = ServiceClient::connect(ClientConfig::new(addr.to_string())).await?;
//! let reply = client.call("Echo", "Say", json!("hello")).await?;
//! println!("{:?}", reply);
//!
//! client.close().await;
//! server.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! [`ScsError`] composes the layer errors ([`TransportError`],
//! [`ChannelError`](channel::ChannelError),
//! [`DispatchError`](dispatch::DispatchError)). Timeouts and failed
//! invocations on the server are not errors: they reach the caller as a
//! [`ResultMessage`](channel::ResultMessage) carrying a
//! [`RemoteError`](channel::RemoteError).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod observability;
pub mod serialization;
pub mod transport;

mod client;
mod server;

pub use channel::{CommunicationChannel, CommunicationState, Message};
pub use client::{ClientConfig, ClientReply, ServiceClient};
pub use dispatch::{DispatcherConfig, Invoker, ServiceChannel, StatusRecorder};
pub use error::ScsError;
pub use observability::{CallMetrics, StatusCounter, TransportMetrics};
pub use server::{ScsServer, ServerConfig};
pub use transport::{ConnectionListener, ListenerConfig, Transport, TransportError};
