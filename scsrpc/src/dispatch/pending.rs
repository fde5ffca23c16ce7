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

//! Hand-off between the worker running an invocation and the dispatch
//! waiting on it.

use super::context::CallerContext;
use crate::channel::ResultMessage;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Worker half of an in-flight call.
///
/// Completing consumes the handle, so a call is completed at most once.
/// Dropping it without completing (the invoker failed or panicked) ends the
/// wait with [`CallOutcome::Abandoned`] once the timeout window has passed.
#[derive(Debug)]
pub struct PendingCall {
    context: CallerContext,
    tx: oneshot::Sender<CallerContext>,
}

/// Dispatch half of an in-flight call.
#[derive(Debug)]
pub struct CallWaiter {
    rx: oneshot::Receiver<CallerContext>,
    fallback: CallerContext,
}

/// How waiting on a [`CallWaiter`] ended.
#[derive(Debug)]
pub enum CallOutcome {
    /// The worker completed the call in time.
    Completed(CallerContext),
    /// The timeout elapsed first. Carries the context as it was dispatched.
    TimedOut(CallerContext),
    /// The worker gave up without completing. Reported at the deadline, like
    /// a timeout.
    Abandoned(CallerContext),
}

impl PendingCall {
    /// Creates the two halves for `context`.
    pub fn new(context: CallerContext) -> (Self, CallWaiter) {
        let (tx, rx) = oneshot::channel();
        let waiter = CallWaiter {
            rx,
            fallback: context.clone(),
        };
        (Self { context, tx }, waiter)
    }

    /// The context the invoker works on.
    pub fn context_mut(&mut self) -> &mut CallerContext {
        &mut self.context
    }

    /// Read-only view of the context.
    pub fn context(&self) -> &CallerContext {
        &self.context
    }

    /// Stores `message` as the answer and wakes the waiter.
    ///
    /// Returns `false` if the waiter already gave up; the result is then
    /// discarded.
    pub fn complete(self, message: Option<ResultMessage>) -> bool {
        let mut context = self.context;
        if message.is_some() {
            context.message = message;
        }
        self.tx.send(context).is_ok()
    }
}

impl CallWaiter {
    /// Waits up to `timeout` for the worker.
    ///
    /// Only a completed call ends the wait early. A worker that drops its
    /// half still costs the caller the full window, so a failed invocation
    /// is indistinguishable from one that never finished.
    pub async fn wait(self, timeout: Duration) -> CallOutcome {
        let deadline = Instant::now() + timeout;
        match tokio::time::timeout_at(deadline, self.rx).await {
            Ok(Ok(context)) => CallOutcome::Completed(context),
            Ok(Err(_)) => {
                tokio::time::sleep_until(deadline).await;
                CallOutcome::Abandoned(self.fallback)
            }
            Err(_) => CallOutcome::TimedOut(self.fallback),
        }
    }
}

impl CallOutcome {
    /// Returns `true` unless the worker completed the call.
    pub fn is_timeout_shaped(&self) -> bool {
        !matches!(self, Self::Completed(_))
    }

    /// Unwraps the context regardless of outcome.
    pub fn into_context(self) -> CallerContext {
        match self {
            Self::Completed(ctx) | Self::TimedOut(ctx) | Self::Abandoned(ctx) => ctx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RequestMessage;
    use serde_json::json;

    fn context() -> CallerContext {
        CallerContext::new(RequestMessage::new(3, "Orders", "Find"), None)
    }

    #[tokio::test]
    async fn test_completed_call() {
        let (mut pending, waiter) = PendingCall::new(context());
        pending.context_mut().count = 5;
        let message = ResultMessage::for_request(&pending.context().request).with_value(json!(1));

        tokio::spawn(async move {
            assert!(pending.complete(Some(message)));
        });

        match waiter.wait(Duration::from_secs(1)).await {
            CallOutcome::Completed(ctx) => {
                assert_eq!(ctx.count, 5);
                assert_eq!(ctx.message.and_then(|m| m.value), Some(json!(1)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_without_message_keeps_invoker_answer() {
        let (mut pending, waiter) = PendingCall::new(context());
        let preset = ResultMessage::for_request(&pending.context().request).with_count(2);
        pending.context_mut().message = Some(preset);
        assert!(pending.complete(None));

        let ctx = waiter.wait(Duration::from_secs(1)).await.into_context();
        assert_eq!(ctx.message.map(|m| m.count), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_completion() {
        let (mut pending, waiter) = PendingCall::new(context());
        pending.context_mut().count = 99;

        let outcome = waiter.wait(Duration::from_millis(50)).await;
        assert!(outcome.is_timeout_shaped());
        let ctx = outcome.into_context();
        assert_eq!(ctx.count, 0);
        assert!(ctx.message.is_none());

        assert!(!pending.complete(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_worker_abandons_at_deadline() {
        let (pending, waiter) = PendingCall::new(context());
        drop(pending);

        let started = Instant::now();
        let outcome = waiter.wait(Duration::from_secs(30)).await;
        assert!(matches!(outcome, CallOutcome::Abandoned(_)));
        assert!(started.elapsed() >= Duration::from_secs(30));
    }
}
