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

//! Wire message protocol.
//!
//! Four envelope kinds travel over a connection, each carrying the
//! correlation id that pairs a request with its answer:
//!
//! - [`Message::Request`]: invoke `service.method(parameters)`
//! - [`Message::Result`]: the structured answer to a request
//! - [`Message::Callback`]: a notification pushed to the peer
//! - [`Message::RawData`]: pre-encoded answer bytes, sent in place of a result
//!
//! The caller assigns correlation ids; the serving side echoes them verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Category of a [`RemoteError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteErrorKind {
    /// No result was produced within the call timeout.
    Timeout,
    /// Application-level failure with only a message, for callers that
    /// expect plain exceptions.
    Application,
    /// Failure reported by the service implementation.
    Service,
    /// Failure inside the transport or dispatcher.
    Internal,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Application => "application",
            Self::Service => "service",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Serializable error carried inside a [`ResultMessage`].
///
/// Errors form a chain through `inner`, outermost first.
///
/// # Examples
///
/// ```rust
/// use scsrpc::channel::{RemoteError, RemoteErrorKind};
///
/// let error = RemoteError::service("order lookup failed")
///     .with_inner(RemoteError::internal("connection refused"));
///
/// assert_eq!(error.innermost().message, "connection refused");
/// assert_eq!(error.innermost().kind, RemoteErrorKind::Internal);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Error category.
    pub kind: RemoteErrorKind,
    /// Human-readable description.
    pub message: String,
    /// The error that caused this one, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<RemoteError>>,
}

impl RemoteError {
    /// Creates an error with no cause.
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            inner: None,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Timeout, message)
    }

    /// Creates an application error.
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Application, message)
    }

    /// Creates a service error.
    pub fn service(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Service, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Internal, message)
    }

    /// Attaches the cause of this error.
    pub fn with_inner(mut self, inner: RemoteError) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    /// Returns the root cause: the last error in the chain.
    pub fn innermost(&self) -> &RemoteError {
        let mut current = self;
        while let Some(inner) = current.inner.as_deref() {
            current = inner;
        }
        current
    }

    /// Returns `true` for a timeout error.
    pub fn is_timeout(&self) -> bool {
        self.kind == RemoteErrorKind::Timeout
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner
            .as_deref()
            .map(|inner| inner as &(dyn std::error::Error + 'static))
    }
}

/// A request to invoke a method on a named service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    /// Caller-assigned id echoed on the answer.
    pub correlation_id: u64,
    /// Target service.
    pub service_name: String,
    /// Target method.
    pub method_name: String,
    /// Method arguments, in whatever shape the invoker expects.
    #[serde(default)]
    pub parameters: Value,
    /// Name of the calling application.
    #[serde(default)]
    pub app_name: String,
    /// Host the caller runs on.
    #[serde(default)]
    pub host_name: String,
    /// The caller expects plain exceptions instead of structured errors.
    #[serde(default)]
    pub invoke_method: bool,
}

impl RequestMessage {
    /// Creates a request with no parameters and an anonymous caller.
    pub fn new(
        correlation_id: u64,
        service_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id,
            service_name: service_name.into(),
            method_name: method_name.into(),
            parameters: Value::Null,
            app_name: String::new(),
            host_name: String::new(),
            invoke_method: false,
        }
    }

    /// Sets the method arguments.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the calling application and host.
    pub fn with_caller(mut self, app_name: impl Into<String>, host_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self.host_name = host_name.into();
        self
    }

    /// Marks the request as made in invoke-method mode.
    pub fn with_invoke_method(mut self, invoke_method: bool) -> Self {
        self.invoke_method = invoke_method;
        self
    }
}

/// The answer to a [`RequestMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    /// Id of the request this answers.
    pub correlation_id: u64,
    /// Service that was called.
    #[serde(default)]
    pub service_name: String,
    /// Method that was called.
    #[serde(default)]
    pub method_name: String,
    /// Return value, absent for void calls or failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Failure description, if the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
    /// Server-side elapsed time in milliseconds.
    #[serde(default)]
    pub elapsed_time: u64,
    /// Number of rows or items the call produced.
    #[serde(default)]
    pub count: u32,
}

impl ResultMessage {
    /// Creates an empty acknowledgement for `request`.
    pub fn for_request(request: &RequestMessage) -> Self {
        Self {
            correlation_id: request.correlation_id,
            service_name: request.service_name.clone(),
            method_name: request.method_name.clone(),
            value: None,
            error: None,
            elapsed_time: 0,
            count: 0,
        }
    }

    /// Sets the return value.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the error.
    pub fn with_error(mut self, error: RemoteError) -> Self {
        self.error = Some(error);
        self
    }

    /// Sets the elapsed time in milliseconds.
    pub fn with_elapsed_time(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_time = elapsed_ms;
        self
    }

    /// Sets the item count.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Returns `true` if the result carries an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Envelope for everything sent over a connection.
///
/// # Examples
///
/// ```rust
/// use scsrpc::channel::{Message, RequestMessage};
///
/// let message = Message::Request(RequestMessage::new(7, "OrderService", "Find"));
/// assert_eq!(message.correlation_id(), 7);
/// assert_eq!(message.kind(), "request");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Invocation request.
    Request(RequestMessage),
    /// Structured answer.
    Result(ResultMessage),
    /// Notification pushed to the peer.
    Callback {
        /// Id of the call the notification relates to.
        correlation_id: u64,
        /// Notification body.
        payload: Value,
    },
    /// Pre-encoded answer bytes.
    RawData {
        /// Id of the request this answers.
        correlation_id: u64,
        /// Answer bytes, passed through untouched.
        data: Vec<u8>,
    },
}

impl Message {
    /// Returns the correlation id of any message kind.
    pub fn correlation_id(&self) -> u64 {
        match self {
            Self::Request(request) => request.correlation_id,
            Self::Result(result) => result.correlation_id,
            Self::Callback { correlation_id, .. } | Self::RawData { correlation_id, .. } => {
                *correlation_id
            }
        }
    }

    /// Returns a short name for the message kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Result(_) => "result",
            Self::Callback { .. } => "callback",
            Self::RawData { .. } => "raw_data",
        }
    }
}

impl From<RequestMessage> for Message {
    fn from(request: RequestMessage) -> Self {
        Self::Request(request)
    }
}

impl From<ResultMessage> for Message {
    fn from(result: ResultMessage) -> Self {
        Self::Result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_innermost_walks_chain() {
        let error = RemoteError::service("outer")
            .with_inner(RemoteError::internal("middle").with_inner(RemoteError::service("root")));
        assert_eq!(error.innermost().message, "root");

        let single = RemoteError::timeout("alone");
        assert_eq!(single.innermost(), &single);
    }

    #[test]
    fn test_remote_error_source_chain() {
        use std::error::Error;

        let error = RemoteError::service("outer").with_inner(RemoteError::internal("root"));
        let source = error.source().map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("internal error: root"));
    }

    #[test]
    fn test_result_for_request_copies_identity() {
        let request = RequestMessage::new(42, "Orders", "Find").with_caller("web", "host-1");
        let result = ResultMessage::for_request(&request);

        assert_eq!(result.correlation_id, 42);
        assert_eq!(result.service_name, "Orders");
        assert_eq!(result.method_name, "Find");
        assert!(result.value.is_none());
        assert!(!result.is_error());
    }

    #[test]
    fn test_message_wire_shape() {
        let message = Message::Result(
            ResultMessage::for_request(&RequestMessage::new(3, "S", "M"))
                .with_value(json!({"ok": true}))
                .with_elapsed_time(15),
        );
        let encoded = serde_json::to_value(&message).unwrap();

        assert_eq!(encoded["type"], "result");
        assert_eq!(encoded["correlation_id"], 3);
        assert_eq!(encoded["elapsed_time"], 15);
        assert!(encoded.get("error").is_none());
    }

    #[test]
    fn test_request_defaults_when_fields_missing() {
        let decoded: Message = serde_json::from_value(json!({
            "type": "request",
            "correlation_id": 9,
            "service_name": "Status",
            "method_name": "Ping"
        }))
        .unwrap();

        match decoded {
            Message::Request(request) => {
                assert_eq!(request.correlation_id, 9);
                assert!(request.parameters.is_null());
                assert!(!request.invoke_method);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_correlation_id_for_every_kind() {
        let messages = [
            Message::from(RequestMessage::new(1, "S", "M")),
            Message::from(ResultMessage::for_request(&RequestMessage::new(2, "S", "M"))),
            Message::Callback {
                correlation_id: 3,
                payload: Value::Null,
            },
            Message::RawData {
                correlation_id: 4,
                data: vec![1, 2, 3],
            },
        ];
        let ids: Vec<u64> = messages.iter().map(Message::correlation_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
