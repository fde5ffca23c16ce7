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

//! Byte transports and the TCP connection listener.
//!
//! A [`Transport`] is a bidirectional byte stream with metadata. The crate
//! ships [`TcpTransport`] for real connections and [`MemoryTransport`] for
//! in-process pairs. [`ConnectionListener`] accepts TCP connections with a
//! configurable number of outstanding accepts and hands them off as
//! communication channels.

mod config;
mod error;
mod listener;
mod memory;
mod tcp;
mod traits;
mod types;

pub use self::config::{DEFAULT_ACCEPT_PARALLELISM, DEFAULT_BACKLOG_MULTIPLIER, ListenerConfig};
pub use self::error::TransportError;
pub use self::listener::{ACCEPT_RETRY_DELAY, AcceptedChannel, ConnectionListener};
pub use self::memory::MemoryTransport;
pub use self::tcp::TcpTransport;
pub use self::traits::Transport;
pub use self::types::{TransportId, TransportMetadata};
