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

//! Collaborators the dispatcher calls out to.

use super::context::{CallEvent, CallerContext};
use super::error::{BoxError, InvokeError};
use crate::channel::{CommunicationState, ResultMessage};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs the requested service method.
///
/// Implementations look up `ctx.request.service_name` and
/// `ctx.request.method_name`, execute it and return the answer. They may
/// instead put pre-encoded bytes in `ctx.buffer`, which are then sent as
/// raw data.
///
/// `state` is the connection state observed when the worker started.
#[async_trait]
pub trait Invoker: Send + Sync + 'static {
    /// Invokes the method named by `ctx`.
    async fn invoke(
        &self,
        state: CommunicationState,
        ctx: &mut CallerContext,
    ) -> Result<Option<ResultMessage>, InvokeError>;
}

/// Receives per-call statistics.
pub trait StatusRecorder: Send + Sync + 'static {
    /// Records one finished call. Failures are logged and otherwise ignored.
    fn record(&self, event: &CallEvent) -> Result<(), BoxError>;
}

#[async_trait]
impl<T: Invoker + ?Sized> Invoker for Arc<T> {
    async fn invoke(
        &self,
        state: CommunicationState,
        ctx: &mut CallerContext,
    ) -> Result<Option<ResultMessage>, InvokeError> {
        (**self).invoke(state, ctx).await
    }
}

impl<T: StatusRecorder + ?Sized> StatusRecorder for Arc<T> {
    fn record(&self, event: &CallEvent) -> Result<(), BoxError> {
        (**self).record(event)
    }
}

/// Status recorder that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatusRecorder;

impl StatusRecorder for NoopStatusRecorder {
    fn record(&self, _event: &CallEvent) -> Result<(), BoxError> {
        Ok(())
    }
}
