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

//! Per-request dispatch: admission, invocation, timeout and response.

use super::config::DispatcherConfig;
use super::context::{CallEvent, CallerContext};
use super::error::DispatchError;
use super::gate::ConcurrencyGate;
use super::invoker::{Invoker, NoopStatusRecorder, StatusRecorder};
use super::pending::{CallOutcome, PendingCall};
use crate::channel::{CommunicationState, Message, MessageSink, RemoteError, ResultMessage};
use crate::observability::CallMetrics;
use crate::transport::TransportError;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, instrument, trace, warn};

/// Serves requests arriving on any number of connections.
///
/// Each call to [`send_response`](Self::send_response) takes one slot of the
/// concurrency gate, runs the invoker on a spawned task, waits at most the
/// configured timeout and writes exactly one answer back, unless the
/// connection went away in the meantime. Timeouts and invoker failures are
/// answered with a timeout error. Only a failed write, or a request refused
/// after [`shutdown`](Self::shutdown), is reported to the caller.
///
/// # Examples
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use scsrpc::channel::{CommunicationState, ResultMessage};
/// use scsrpc::dispatch::{CallerContext, DispatcherConfig, InvokeError, Invoker, ServiceChannel};
/// use std::sync::Arc;
///
/// struct Ping;
///
/// #[async_trait]
/// impl Invoker for Ping {
///     async fn invoke(
///         &self,
///         _state: CommunicationState,
///         ctx: &mut CallerContext,
///     ) -> Result<Option<ResultMessage>, InvokeError> {
///         Ok(Some(ResultMessage::for_request(&ctx.request).with_value("pong".into())))
///     }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dispatcher = ServiceChannel::new(DispatcherConfig::default(), Arc::new(Ping))?;
/// assert_eq!(dispatcher.gate().max(), 100);
/// # Ok(())
/// # }
/// ```
pub struct ServiceChannel {
    config: DispatcherConfig,
    invoker: Arc<dyn Invoker>,
    status: Arc<dyn StatusRecorder>,
    gate: ConcurrencyGate,
    metrics: Arc<CallMetrics>,
    callbacks: broadcast::Sender<CallEvent>,
}

impl ServiceChannel {
    /// Creates a dispatcher with a no-op status recorder.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] if `config` does not
    /// validate.
    pub fn new(config: DispatcherConfig, invoker: Arc<dyn Invoker>) -> Result<Self, TransportError> {
        config.validate()?;
        let max_caller = NonZeroUsize::new(config.max_caller).ok_or_else(|| {
            TransportError::InvalidConfiguration {
                reason: "max_caller must be greater than 0".to_string(),
            }
        })?;
        let (callbacks, _) = broadcast::channel(config.callback_capacity);
        Ok(Self {
            gate: ConcurrencyGate::new(max_caller),
            config,
            invoker,
            status: Arc::new(NoopStatusRecorder),
            metrics: Arc::new(CallMetrics::new()),
            callbacks,
        })
    }

    /// Replaces the status recorder.
    pub fn with_status_recorder(mut self, status: Arc<dyn StatusRecorder>) -> Self {
        self.status = status;
        self
    }

    /// Shares call metrics with other components.
    pub fn with_metrics(mut self, metrics: Arc<CallMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Returns the concurrency gate.
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Returns the call metrics.
    pub fn metrics(&self) -> &Arc<CallMetrics> {
        &self.metrics
    }

    /// Subscribes to per-call events. Slow subscribers lose the oldest
    /// events.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.callbacks.subscribe()
    }

    /// Stops admitting calls. Calls already admitted run to completion.
    pub fn shutdown(&self) {
        self.gate.close();
    }

    /// Returns a dispatcher with a fresh gate that shares this one's
    /// invoker, status recorder, metrics and subscribers.
    ///
    /// Used to serve again after [`shutdown`](Self::shutdown).
    pub fn reopened(&self) -> Self {
        Self {
            config: self.config.clone(),
            invoker: Arc::clone(&self.invoker),
            status: Arc::clone(&self.status),
            gate: ConcurrencyGate::new(self.gate_size()),
            metrics: Arc::clone(&self.metrics),
            callbacks: self.callbacks.clone(),
        }
    }

    fn gate_size(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.gate.max()).unwrap_or(NonZeroUsize::MIN)
    }

    /// Serves one request and writes its answer to `sink`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::GateClosed`] after [`shutdown`](Self::shutdown);
    ///   the request is still answered with an error result when the
    ///   connection is up
    /// - [`DispatchError::SendFailed`] if writing the answer failed
    #[instrument(
        level = "debug",
        skip_all,
        fields(
            transport_id = %sink.transport_id(),
            correlation_id = ctx.correlation_id(),
            service = %ctx.request.service_name,
            method = %ctx.request.method_name,
        )
    )]
    pub async fn send_response(
        &self,
        sink: Arc<dyn MessageSink>,
        ctx: CallerContext,
    ) -> Result<(), DispatchError> {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(error) => {
                self.reject(sink.as_ref(), ctx).await;
                return Err(error);
            }
        };
        self.metrics.record_dispatched();
        let started = Instant::now();

        let (pending, waiter) = PendingCall::new(ctx);
        tokio::spawn(run_invocation(
            Arc::clone(&self.invoker),
            Arc::clone(&sink),
            pending,
        ));

        let mut ctx = match waiter.wait(self.config.timeout()).await {
            CallOutcome::Completed(mut ctx) => {
                self.metrics.record_completed(started.elapsed());
                if ctx.message.is_none() {
                    ctx.message = Some(ResultMessage::for_request(&ctx.request));
                }
                ctx
            }
            CallOutcome::TimedOut(mut ctx) => {
                self.metrics.record_timed_out();
                debug!(timeout_secs = self.config.timeout_secs, "call timed out");
                ctx.message = Some(self.timeout_result(&ctx));
                ctx
            }
            CallOutcome::Abandoned(mut ctx) => {
                self.metrics.record_invocation_fault();
                ctx.message = Some(self.timeout_result(&ctx));
                ctx
            }
        };

        if let Some(message) = ctx.message.as_mut() {
            message.correlation_id = ctx.request.correlation_id;
        }

        self.post_process(&mut ctx);
        self.send(sink.as_ref(), ctx).await
    }

    /// Answers a request that was never admitted. Best effort: the caller
    /// already gets [`DispatchError::GateClosed`].
    async fn reject(&self, sink: &dyn MessageSink, ctx: CallerContext) {
        if sink.state() != CommunicationState::Connected {
            return;
        }
        let body = format!(
            "Service ({}, {}) is not accepting calls, dispatcher is shut down.",
            ctx.request.service_name, ctx.request.method_name
        );
        let result = ResultMessage::for_request(&ctx.request).with_error(RemoteError::internal(body));
        if let Err(error) = sink.send_message(&Message::Result(result)).await {
            debug!(%error, "failed to send rejection");
        }
    }

    fn timeout_result(&self, ctx: &CallerContext) -> ResultMessage {
        let timeout_ms = self.config.timeout_millis();
        let body = format!(
            "Async call service ({}, {})  timeout ({}) ms. Work item timeout.",
            ctx.request.service_name, ctx.request.method_name, timeout_ms
        );
        ResultMessage::for_request(&ctx.request)
            .with_error(RemoteError::timeout(body))
            .with_elapsed_time(timeout_ms)
    }

    /// Records statistics, notifies subscribers and shapes the error for the
    /// caller's mode.
    fn post_process(&self, ctx: &mut CallerContext) {
        let Some(message) = ctx.message.as_ref() else {
            return;
        };

        if ctx.caller.service_name != self.config.status_service {
            let event = CallEvent::new(ctx, message);
            match catch_unwind(AssertUnwindSafe(|| self.status.record(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => warn!(%error, "status recorder failed"),
                Err(_) => warn!("status recorder panicked"),
            }
            // No subscribers is not an error.
            let _ = self.callbacks.send(event);
        }

        if ctx.request.invoke_method {
            if let Some(message) = ctx.message.as_mut() {
                if let Some(error) = message.error.take() {
                    let innermost = error.innermost().message.clone();
                    message.error = Some(RemoteError::application(innermost));
                }
            }
        }
    }

    async fn send(&self, sink: &dyn MessageSink, ctx: CallerContext) -> Result<(), DispatchError> {
        if sink.state() != CommunicationState::Connected {
            self.metrics.record_dropped();
            debug!("connection gone, dropping response");
            return Ok(());
        }

        let correlation_id = ctx.request.correlation_id;
        let message = match (ctx.buffer, ctx.message) {
            (Some(data), _) => Message::RawData {
                correlation_id,
                data,
            },
            (None, Some(result)) => Message::Result(result),
            (None, None) => return Ok(()),
        };

        trace!(kind = message.kind(), "sending response");
        sink.send_message(&message).await.map_err(|source| {
            self.metrics.record_send_failure();
            warn!(error = %source, "failed to send response");
            DispatchError::SendFailed {
                service: ctx.caller.service_name,
                method: ctx.caller.method_name,
                source,
            }
        })
    }
}

impl std::fmt::Debug for ServiceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceChannel")
            .field("config", &self.config)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

/// Worker body. Completes `pending` unless the invoker fails; a failure
/// drops it, which the waiting side answers with a timeout error.
async fn run_invocation(
    invoker: Arc<dyn Invoker>,
    sink: Arc<dyn MessageSink>,
    mut pending: PendingCall,
) {
    let state = sink.state();
    if state != CommunicationState::Connected {
        pending.complete(None);
        return;
    }

    let correlation_id = pending.context().correlation_id();
    match invoker.invoke(state, pending.context_mut()).await {
        Ok(message) => {
            if !pending.complete(message) {
                trace!(correlation_id, "result arrived after timeout, discarded");
            }
        }
        Err(error) => {
            warn!(
                transport_id = %sink.transport_id(),
                service = %pending.context().request.service_name,
                method = %pending.context().request.method_name,
                %error,
                "invocation failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelError, RemoteErrorKind, RequestMessage};
    use crate::dispatch::{BoxError, InvokeError};
    use crate::transport::TransportId;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct RecordingSink {
        state: Mutex<CommunicationState>,
        sent: Mutex<Vec<Message>>,
        fail: bool,
    }

    impl RecordingSink {
        fn connected() -> Arc<Self> {
            Arc::new(Self {
                state: Mutex::new(CommunicationState::Connected),
                sent: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn disconnected() -> Arc<Self> {
            let sink = Self::connected();
            *sink.state.lock() = CommunicationState::Disconnected;
            sink
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                state: Mutex::new(CommunicationState::Connected),
                sent: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn sent(&self) -> Vec<Message> {
            self.sent.lock().clone()
        }

        fn single_result(&self) -> ResultMessage {
            let sent = self.sent();
            assert_eq!(sent.len(), 1, "expected exactly one response");
            match sent.into_iter().next() {
                Some(Message::Result(result)) => result,
                other => panic!("expected a result, got {other:?}"),
            }
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        fn transport_id(&self) -> TransportId {
            TransportId::new(1)
        }

        fn remote_addr(&self) -> Option<SocketAddr> {
            None
        }

        fn state(&self) -> CommunicationState {
            *self.state.lock()
        }

        async fn send_message(&self, message: &Message) -> Result<(), ChannelError> {
            if self.fail {
                return Err(ChannelError::Transport(TransportError::WriteFailed {
                    source: io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"),
                }));
            }
            self.sent.lock().push(message.clone());
            Ok(())
        }
    }

    /// Answers by echoing the parameters, optionally after a delay.
    struct EchoInvoker {
        delay: Duration,
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl EchoInvoker {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Invoker for EchoInvoker {
        async fn invoke(
            &self,
            _state: CommunicationState,
            ctx: &mut CallerContext,
        ) -> Result<Option<ResultMessage>, InvokeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.running.fetch_sub(1, Ordering::SeqCst);

            let mut result = ResultMessage::for_request(&ctx.request)
                .with_value(ctx.request.parameters.clone())
                .with_elapsed_time(5)
                .with_count(1);
            // Invokers do not have to get the id right.
            result.correlation_id = 999;
            Ok(Some(result))
        }
    }

    /// Answers with a fixed error chain.
    struct ErrorInvoker;

    #[async_trait]
    impl Invoker for ErrorInvoker {
        async fn invoke(
            &self,
            _state: CommunicationState,
            ctx: &mut CallerContext,
        ) -> Result<Option<ResultMessage>, InvokeError> {
            let error = RemoteError::service("Orders.Find failed")
                .with_inner(RemoteError::internal("connection pool exhausted"));
            Ok(Some(ResultMessage::for_request(&ctx.request).with_error(error)))
        }
    }

    /// Fails outright.
    struct FaultInvoker;

    #[async_trait]
    impl Invoker for FaultInvoker {
        async fn invoke(
            &self,
            _state: CommunicationState,
            _ctx: &mut CallerContext,
        ) -> Result<Option<ResultMessage>, InvokeError> {
            Err(InvokeError::new("service not registered"))
        }
    }

    /// Produces pre-encoded bytes only.
    struct RawInvoker;

    #[async_trait]
    impl Invoker for RawInvoker {
        async fn invoke(
            &self,
            _state: CommunicationState,
            ctx: &mut CallerContext,
        ) -> Result<Option<ResultMessage>, InvokeError> {
            ctx.buffer = Some(b"cached-bytes".to_vec());
            ctx.count = 12;
            Ok(None)
        }
    }

    #[derive(Default)]
    struct CollectingRecorder {
        events: Mutex<Vec<CallEvent>>,
    }

    impl StatusRecorder for CollectingRecorder {
        fn record(&self, event: &CallEvent) -> Result<(), BoxError> {
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    struct BrokenRecorder;

    impl StatusRecorder for BrokenRecorder {
        fn record(&self, _event: &CallEvent) -> Result<(), BoxError> {
            Err("status store unavailable".into())
        }
    }

    fn dispatcher(invoker: Arc<dyn Invoker>, config: DispatcherConfig) -> ServiceChannel {
        ServiceChannel::new(config, invoker).unwrap()
    }

    fn context(id: u64, service: &str, method: &str) -> CallerContext {
        let request = RequestMessage::new(id, service, method)
            .with_parameters(json!({"id": id}))
            .with_caller("web-shop", "web-01");
        CallerContext::new(request, None)
    }

    #[tokio::test]
    async fn test_successful_call_is_answered_once() {
        let recorder = Arc::new(CollectingRecorder::default());
        let service = dispatcher(EchoInvoker::new(Duration::ZERO), DispatcherConfig::default())
            .with_status_recorder(recorder.clone());
        let mut events = service.subscribe();
        let sink = RecordingSink::connected();

        service
            .send_response(sink.clone(), context(7, "Orders", "Find"))
            .await
            .unwrap();

        let result = sink.single_result();
        assert_eq!(result.correlation_id, 7);
        assert_eq!(result.value, Some(json!({"id": 7})));
        assert!(result.error.is_none());

        let recorded = recorder.events.lock().clone();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].elapsed_time, result.elapsed_time);
        assert_eq!(recorded[0].elapsed_time, 5);
        assert_eq!(recorded[0].value, result.value);
        assert_eq!(recorded[0].value, Some(json!({"id": 7})));
        assert_eq!(recorded[0].caller.app_name, "web-shop");

        let event = events.try_recv().unwrap();
        assert_eq!(event.correlation_id, 7);

        assert_eq!(service.gate().available_permits(), service.gate().max());
        assert_eq!(service.metrics().total_completed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_synthesizes_result() {
        let recorder = Arc::new(CollectingRecorder::default());
        let config = DispatcherConfig::default().with_timeout_secs(2);
        let service = dispatcher(EchoInvoker::new(Duration::from_secs(60)), config)
            .with_status_recorder(recorder.clone());
        let sink = RecordingSink::connected();

        service
            .send_response(sink.clone(), context(8, "Orders", "Slow"))
            .await
            .unwrap();

        let result = sink.single_result();
        assert_eq!(result.correlation_id, 8);
        assert_eq!(result.elapsed_time, 2000);
        let error = result.error.unwrap();
        assert_eq!(error.kind, RemoteErrorKind::Timeout);
        assert_eq!(
            error.message,
            "Async call service (Orders, Slow)  timeout (2000) ms. Work item timeout."
        );

        let recorded = recorder.events.lock().clone();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].elapsed_time, 2000);
        assert!(recorded[0].is_timeout());

        assert_eq!(service.gate().in_flight(), 0);
        assert_eq!(service.metrics().total_timed_out(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invocation_fault_is_answered_at_deadline() {
        let config = DispatcherConfig::default().with_timeout_secs(2);
        let service = dispatcher(Arc::new(FaultInvoker), config);
        let sink = RecordingSink::connected();

        let started = tokio::time::Instant::now();
        service
            .send_response(sink.clone(), context(9, "Orders", "Missing"))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));

        let result = sink.single_result();
        assert_eq!(result.correlation_id, 9);
        assert_eq!(result.elapsed_time, 2000);
        assert!(result.error.unwrap().is_timeout());
        assert_eq!(service.metrics().total_invocation_faults(), 1);
        assert_eq!(service.gate().in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded_by_max_caller() {
        let invoker = EchoInvoker::new(Duration::from_millis(100));
        let config = DispatcherConfig::default().with_max_caller(2);
        let service = Arc::new(dispatcher(invoker.clone(), config));
        let sink = RecordingSink::connected();

        let mut handles = Vec::new();
        for id in 0..6 {
            let service = Arc::clone(&service);
            let sink: Arc<dyn MessageSink> = sink.clone();
            handles.push(tokio::spawn(async move {
                service.send_response(sink, context(id, "Orders", "Find")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(invoker.calls.load(Ordering::SeqCst), 6);
        assert!(invoker.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(sink.sent().len(), 6);
        assert_eq!(service.gate().available_permits(), 2);
    }

    #[tokio::test]
    async fn test_status_service_calls_are_not_recorded() {
        let recorder = Arc::new(CollectingRecorder::default());
        let service = dispatcher(EchoInvoker::new(Duration::ZERO), DispatcherConfig::default())
            .with_status_recorder(recorder.clone());
        let mut events = service.subscribe();
        let sink = RecordingSink::connected();

        service
            .send_response(sink.clone(), context(1, "StatusService", "GetStatus"))
            .await
            .unwrap();

        let result = sink.single_result();
        assert_eq!(result.correlation_id, 1);
        assert_eq!(result.value, Some(json!({"id": 1})));
        assert!(recorder.events.lock().is_empty());
        assert!(events.try_recv().is_err());

        service
            .send_response(sink.clone(), context(2, "Orders", "Find"))
            .await
            .unwrap();
        let recorded = recorder.events.lock().clone();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].correlation_id, 2);
        assert_eq!(recorded[0].value, Some(json!({"id": 2})));
    }

    #[tokio::test]
    async fn test_raw_buffer_is_sent_as_raw_data() {
        let recorder = Arc::new(CollectingRecorder::default());
        let service = dispatcher(Arc::new(RawInvoker), DispatcherConfig::default())
            .with_status_recorder(recorder.clone());
        let sink = RecordingSink::connected();

        service
            .send_response(sink.clone(), context(21, "Orders", "Cached"))
            .await
            .unwrap();

        assert_eq!(
            sink.sent(),
            vec![Message::RawData {
                correlation_id: 21,
                data: b"cached-bytes".to_vec()
            }]
        );
        // An empty acknowledgement stands in for the missing result.
        let recorded = recorder.events.lock().clone();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].count, 12);
        assert!(!recorded[0].is_error());
    }

    #[tokio::test]
    async fn test_invoke_method_flattens_error_after_recording() {
        let recorder = Arc::new(CollectingRecorder::default());
        let service = dispatcher(Arc::new(ErrorInvoker), DispatcherConfig::default())
            .with_status_recorder(recorder.clone());
        let sink = RecordingSink::connected();

        let mut ctx = context(4, "Orders", "Find");
        ctx.request.invoke_method = true;
        service.send_response(sink.clone(), ctx).await.unwrap();

        let error = sink.single_result().error.unwrap();
        assert_eq!(error.kind, RemoteErrorKind::Application);
        assert_eq!(error.message, "connection pool exhausted");
        assert!(error.inner.is_none());

        let recorded = recorder.events.lock().clone();
        let original = recorded[0].error.clone().unwrap();
        assert_eq!(original.kind, RemoteErrorKind::Service);
        assert!(original.inner.is_some());
    }

    #[tokio::test]
    async fn test_structured_errors_kept_outside_invoke_method() {
        let service = dispatcher(Arc::new(ErrorInvoker), DispatcherConfig::default());
        let sink = RecordingSink::connected();

        service
            .send_response(sink.clone(), context(4, "Orders", "Find"))
            .await
            .unwrap();

        let error = sink.single_result().error.unwrap();
        assert_eq!(error.kind, RemoteErrorKind::Service);
        assert_eq!(error.innermost().message, "connection pool exhausted");
    }

    #[tokio::test]
    async fn test_disconnected_connection_drops_response() {
        let invoker = EchoInvoker::new(Duration::ZERO);
        let service = dispatcher(invoker.clone(), DispatcherConfig::default());
        let sink = RecordingSink::disconnected();

        service
            .send_response(sink.clone(), context(5, "Orders", "Find"))
            .await
            .unwrap();

        assert!(sink.sent().is_empty());
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.metrics().total_dropped(), 1);
        assert_eq!(service.gate().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_carries_call_context() {
        let service = dispatcher(EchoInvoker::new(Duration::ZERO), DispatcherConfig::default());
        let sink = RecordingSink::failing();

        let error = service
            .send_response(sink, context(6, "Orders", "Find"))
            .await
            .unwrap_err();

        assert!(matches!(
            &error,
            DispatchError::SendFailed { service, method, .. } if service == "Orders" && method == "Find"
        ));
        assert!(error.to_string().starts_with("sending message (Orders, Find) error"));
        assert!(error.is_connection_fault());
        assert_eq!(service.metrics().total_send_failures(), 1);
        assert_eq!(service.gate().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_recorder_failure_does_not_break_response() {
        let service = dispatcher(EchoInvoker::new(Duration::ZERO), DispatcherConfig::default())
            .with_status_recorder(Arc::new(BrokenRecorder));
        let sink = RecordingSink::connected();

        service
            .send_response(sink.clone(), context(2, "Orders", "Find"))
            .await
            .unwrap();

        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_calls() {
        let service = dispatcher(EchoInvoker::new(Duration::ZERO), DispatcherConfig::default());
        service.shutdown();

        let sink = RecordingSink::connected();
        let result = service
            .send_response(sink.clone(), context(1, "Orders", "Find"))
            .await;
        assert!(matches!(result, Err(DispatchError::GateClosed)));

        let answer = sink.single_result();
        assert_eq!(answer.correlation_id, 1);
        assert!(answer.value.is_none());
        let error = answer.error.unwrap();
        assert_eq!(error.kind, RemoteErrorKind::Internal);
        assert_eq!(
            error.message,
            "Service (Orders, Find) is not accepting calls, dispatcher is shut down."
        );
    }

    #[tokio::test]
    async fn test_shutdown_rejection_skips_dead_connection() {
        let service = dispatcher(EchoInvoker::new(Duration::ZERO), DispatcherConfig::default());
        service.shutdown();
        let sink = RecordingSink::disconnected();

        let result = service
            .send_response(sink.clone(), context(1, "Orders", "Find"))
            .await;
        assert!(matches!(result, Err(DispatchError::GateClosed)));
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reopened_dispatcher_serves_again() {
        let recorder = Arc::new(CollectingRecorder::default());
        let config = DispatcherConfig::default().with_max_caller(3);
        let service = dispatcher(EchoInvoker::new(Duration::ZERO), config)
            .with_status_recorder(recorder.clone());
        let mut events = service.subscribe();
        service.shutdown();

        let reopened = service.reopened();
        assert!(!reopened.gate().is_closed());
        assert_eq!(reopened.gate().max(), 3);
        assert!(Arc::ptr_eq(reopened.metrics(), service.metrics()));

        let sink = RecordingSink::connected();
        reopened
            .send_response(sink.clone(), context(11, "Orders", "Find"))
            .await
            .unwrap();

        assert_eq!(sink.single_result().value, Some(json!({"id": 11})));
        assert_eq!(recorder.events.lock().len(), 1);
        assert_eq!(events.try_recv().unwrap().correlation_id, 11);
        assert_eq!(service.metrics().total_completed(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DispatcherConfig::default().with_max_caller(0);
        assert!(ServiceChannel::new(config, Arc::new(FaultInvoker)).is_err());
    }
}
