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

//! Request dispatch.
//!
//! [`ServiceChannel`] turns each inbound [`RequestMessage`](crate::channel::RequestMessage)
//! into exactly one answer:
//!
//! 1. take a slot from the [`ConcurrencyGate`] (bounded by `max_caller`)
//! 2. run the [`Invoker`] on a spawned task
//! 3. wait up to the call timeout, synthesizing a timeout result if needed
//! 4. report a [`CallEvent`] to the [`StatusRecorder`] and subscribers
//! 5. write the answer back, as raw data or as a result
//!
//! The slot is released when the dispatch finishes, however it finishes.

mod config;
mod context;
mod error;
mod gate;
mod invoker;
mod pending;
mod service_channel;

pub use config::{DEFAULT_MAX_CALLER, DEFAULT_STATUS_SERVICE, DEFAULT_TIMEOUT_SECS, DispatcherConfig};
pub use context::{AppCaller, CallEvent, CallerContext};
pub use error::{BoxError, DispatchError, InvokeError};
pub use gate::{ConcurrencyGate, GateMetrics, GatePermit};
pub use invoker::{Invoker, NoopStatusRecorder, StatusRecorder};
pub use pending::{CallOutcome, CallWaiter, PendingCall};
pub use service_channel::ServiceChannel;
