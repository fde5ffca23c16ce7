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

//! Per-call state carried through dispatch.

use crate::channel::{RemoteError, RequestMessage, ResultMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};

/// Identity of the remote application making a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCaller {
    /// Name the calling application reported.
    pub app_name: String,
    /// Host name the calling application reported.
    pub host_name: String,
    /// Address of the connection the call arrived on.
    pub ip_address: Option<IpAddr>,
    /// Target service.
    pub service_name: String,
    /// Target method.
    pub method_name: String,
}

impl AppCaller {
    /// Builds the caller identity for `request` arriving from `remote_addr`.
    pub fn from_request(request: &RequestMessage, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            app_name: request.app_name.clone(),
            host_name: request.host_name.clone(),
            ip_address: remote_addr.map(|addr| addr.ip()),
            service_name: request.service_name.clone(),
            method_name: request.method_name.clone(),
        }
    }
}

/// Everything one request's dispatch reads and writes.
///
/// Owned by a single dispatch; the invoker gets it mutably and may fill in
/// `buffer` (pre-encoded answer bytes) or `count`.
#[derive(Debug, Clone)]
pub struct CallerContext {
    /// The request being served.
    pub request: RequestMessage,
    /// Who is calling.
    pub caller: AppCaller,
    /// The answer, once known.
    pub message: Option<ResultMessage>,
    /// Pre-encoded answer; when present it is sent instead of `message`.
    pub buffer: Option<Vec<u8>>,
    /// Items produced so far, for calls re-executed from a cache.
    pub count: u32,
}

impl CallerContext {
    /// Creates the context for a newly arrived request.
    pub fn new(request: RequestMessage, remote_addr: Option<SocketAddr>) -> Self {
        let caller = AppCaller::from_request(&request, remote_addr);
        Self {
            request,
            caller,
            message: None,
            buffer: None,
            count: 0,
        }
    }

    /// Returns the request's correlation id.
    pub fn correlation_id(&self) -> u64 {
        self.request.correlation_id
    }
}

/// Statistics for one finished call, handed to the status recorder and to
/// callback subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEvent {
    /// Correlation id of the call.
    pub correlation_id: u64,
    /// Who called what.
    pub caller: AppCaller,
    /// Elapsed time in milliseconds; the full timeout for timed-out calls.
    pub elapsed_time: u64,
    /// Larger of the result's count and the context's count.
    pub count: u32,
    /// Error, if the call failed or timed out.
    pub error: Option<RemoteError>,
    /// Returned value, if any.
    pub value: Option<Value>,
}

impl CallEvent {
    /// Builds the event for `context` answered with `message`.
    pub fn new(context: &CallerContext, message: &ResultMessage) -> Self {
        Self {
            correlation_id: context.correlation_id(),
            caller: context.caller.clone(),
            elapsed_time: message.elapsed_time,
            count: message.count.max(context.count),
            error: message.error.clone(),
            value: message.value.clone(),
        }
    }

    /// Returns `true` if the call failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns `true` if the call timed out.
    pub fn is_timeout(&self) -> bool {
        self.error.as_ref().is_some_and(RemoteError::is_timeout)
    }
}
