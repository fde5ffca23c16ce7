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

//! Metrics for transport and dispatch.
//!
//! Counters are atomics so they can be read at any time without locking.
//! With the `observability` feature enabled every update is also emitted
//! through the [`metrics`](https://docs.rs/metrics) facade.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics for the transport layer: connections, bytes and socket errors.
///
/// One instance is shared by a listener and every channel it creates.
///
/// # Examples
///
/// ```rust
/// use scsrpc::observability::TransportMetrics;
///
/// let metrics = TransportMetrics::new();
/// metrics.record_connection_opened();
/// metrics.record_bytes_sent(1024);
/// metrics.record_bytes_received(512);
///
/// assert_eq!(metrics.active_connections(), 1);
/// assert_eq!(metrics.total_bytes_sent(), 1024);
/// assert_eq!(metrics.total_bytes_received(), 512);
/// ```
#[derive(Debug, Default)]
pub struct TransportMetrics {
    /// Total number of connections opened
    connections_opened: AtomicU64,
    /// Total number of connections closed
    connections_closed: AtomicU64,
    /// Total bytes written to sockets
    bytes_sent: AtomicU64,
    /// Total bytes read from sockets
    bytes_received: AtomicU64,
    /// Frames written
    messages_sent: AtomicU64,
    /// Frames decoded into messages
    messages_received: AtomicU64,
    /// Failed accept operations
    accept_errors: AtomicU64,
    /// Failed reads
    read_errors: AtomicU64,
    /// Failed writes
    write_errors: AtomicU64,
    /// Frames that could not be decoded
    frame_errors: AtomicU64,
}

impl TransportMetrics {
    /// Creates a new transport metrics tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new connection being opened.
    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        {
            metrics::counter!("scsrpc.transport.connections.opened").increment(1);
            metrics::gauge!("scsrpc.transport.connections.active").increment(1.0);
        }
    }

    /// Records a connection being closed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scsrpc::observability::TransportMetrics;
    ///
    /// let metrics = TransportMetrics::new();
    /// metrics.record_connection_opened();
    /// metrics.record_connection_closed();
    /// assert_eq!(metrics.active_connections(), 0);
    /// ```
    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        {
            metrics::counter!("scsrpc.transport.connections.closed").increment(1);
            metrics::gauge!("scsrpc.transport.connections.active").decrement(1.0);
        }
    }

    /// Records bytes written to a socket.
    pub fn record_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.transport.bytes.sent").increment(bytes);
    }

    /// Records bytes read from a socket.
    pub fn record_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.transport.bytes.received").increment(bytes);
    }

    /// Records a frame being written.
    pub fn record_message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.transport.messages.sent").increment(1);
    }

    /// Records a frame being decoded into a message.
    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.transport.messages.received").increment(1);
    }

    /// Records a failed accept.
    pub fn record_accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.transport.errors.accept").increment(1);
    }

    /// Records a read error.
    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.transport.errors.read").increment(1);
    }

    /// Records a write error.
    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.transport.errors.write").increment(1);
    }

    /// Records a frame that failed to decode.
    pub fn record_frame_error(&self) {
        self.frame_errors.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.transport.errors.frame").increment(1);
    }

    /// Returns the number of currently active connections.
    #[must_use]
    pub fn active_connections(&self) -> u64 {
        let opened = self.connections_opened.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);
        opened.saturating_sub(closed)
    }

    /// Returns the total number of connections opened.
    #[must_use]
    pub fn total_connections_opened(&self) -> u64 {
        self.connections_opened.load(Ordering::Relaxed)
    }

    /// Returns the total number of connections closed.
    #[must_use]
    pub fn total_connections_closed(&self) -> u64 {
        self.connections_closed.load(Ordering::Relaxed)
    }

    /// Returns the total bytes sent.
    #[must_use]
    pub fn total_bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Returns the total bytes received.
    #[must_use]
    pub fn total_bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Returns the total frames sent.
    #[must_use]
    pub fn total_messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Returns the total frames received.
    #[must_use]
    pub fn total_messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Returns the total number of failed accepts.
    #[must_use]
    pub fn total_accept_errors(&self) -> u64 {
        self.accept_errors.load(Ordering::Relaxed)
    }

    /// Returns the total number of read errors.
    #[must_use]
    pub fn total_read_errors(&self) -> u64 {
        self.read_errors.load(Ordering::Relaxed)
    }

    /// Returns the total number of write errors.
    #[must_use]
    pub fn total_write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    /// Returns the total number of undecodable frames.
    #[must_use]
    pub fn total_frame_errors(&self) -> u64 {
        self.frame_errors.load(Ordering::Relaxed)
    }
}

/// Metrics for the service-channel dispatcher.
///
/// # Examples
///
/// ```rust
/// use scsrpc::observability::CallMetrics;
/// use std::time::Duration;
///
/// let metrics = CallMetrics::new();
/// metrics.record_dispatched();
/// metrics.record_completed(Duration::from_millis(12));
///
/// assert_eq!(metrics.total_dispatched(), 1);
/// assert_eq!(metrics.total_completed(), 1);
/// assert_eq!(metrics.average_latency(), Duration::from_millis(12));
/// ```
#[derive(Debug, Default)]
pub struct CallMetrics {
    /// Requests admitted through the gate
    dispatched: AtomicU64,
    /// Calls answered with an invoker result
    completed: AtomicU64,
    /// Calls answered with a synthesized timeout result
    timed_out: AtomicU64,
    /// Invocations that returned an error or panicked
    invocation_faults: AtomicU64,
    /// Responses dropped because the connection was gone
    dropped: AtomicU64,
    /// Responses that failed to send
    send_failures: AtomicU64,
    /// Sum of completed call latencies in microseconds
    total_latency_us: AtomicU64,
    /// Number of latency measurements
    latency_count: AtomicU64,
}

impl CallMetrics {
    /// Creates a new call metrics tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request admitted for dispatch.
    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.dispatch.calls.dispatched").increment(1);
    }

    /// Records a call completed by the invoker within the timeout.
    pub fn record_completed(&self, latency: Duration) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        let us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.total_latency_us.fetch_add(us, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        {
            metrics::counter!("scsrpc.dispatch.calls.completed").increment(1);
            metrics::histogram!("scsrpc.dispatch.latency.us").record(us as f64);
        }
    }

    /// Records a call answered with a synthesized timeout result.
    pub fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.dispatch.calls.timed_out").increment(1);
    }

    /// Records an invocation that failed or panicked.
    pub fn record_invocation_fault(&self) {
        self.invocation_faults.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.dispatch.errors.invocation").increment(1);
    }

    /// Records a response dropped on a disconnected channel.
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.dispatch.calls.dropped").increment(1);
    }

    /// Records a response that could not be sent.
    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "observability")]
        metrics::counter!("scsrpc.dispatch.errors.send").increment(1);
    }

    /// Returns the number of admitted requests.
    #[must_use]
    pub fn total_dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Returns the number of calls completed by the invoker.
    #[must_use]
    pub fn total_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Returns the number of synthesized timeout results.
    #[must_use]
    pub fn total_timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Returns the number of failed or panicked invocations.
    #[must_use]
    pub fn total_invocation_faults(&self) -> u64 {
        self.invocation_faults.load(Ordering::Relaxed)
    }

    /// Returns the number of responses dropped on disconnected channels.
    #[must_use]
    pub fn total_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of responses that failed to send.
    #[must_use]
    pub fn total_send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    /// Returns the average completed-call latency in microseconds.
    ///
    /// Returns 0 if no call has completed.
    #[must_use]
    pub fn average_latency_us(&self) -> u64 {
        let total = self.total_latency_us.load(Ordering::Relaxed);
        let count = self.latency_count.load(Ordering::Relaxed);
        if count == 0 { 0 } else { total / count }
    }

    /// Returns the average completed-call latency.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        Duration::from_micros(self.average_latency_us())
    }
}
