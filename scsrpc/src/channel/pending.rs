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

//! Caller-side table of requests awaiting an answer.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Maps correlation ids to the tasks waiting for their answers.
///
/// A response arriving on the connection is routed with
/// [`complete`](Self::complete); when the connection drops,
/// [`fail_all`](Self::fail_all) releases every waiter, whose receiver then
/// reports an error.
///
/// # Example
///
/// ```rust
/// use scsrpc::channel::PendingRequests;
///
/// # async fn example() {
/// let pending = PendingRequests::<String>::new();
/// let rx = pending.register(42);
///
/// assert!(pending.complete(42, "answer".to_string()));
/// assert_eq!(rx.await.unwrap(), "answer");
/// # }
/// ```
#[derive(Debug)]
pub struct PendingRequests<T> {
    requests: Mutex<HashMap<u64, oneshot::Sender<T>>>,
}

impl<T> PendingRequests<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a waiter for `correlation_id`.
    ///
    /// Registering an id twice replaces the first waiter, whose receiver
    /// then fails.
    pub fn register(&self, correlation_id: u64) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        self.requests.lock().insert(correlation_id, tx);
        rx
    }

    /// Delivers `response` to the waiter for `correlation_id`.
    ///
    /// Returns `false` if no waiter is registered (unknown id, already
    /// answered, or cancelled after a timeout) or the waiter is gone.
    pub fn complete(&self, correlation_id: u64, response: T) -> bool {
        let sender = self.requests.lock().remove(&correlation_id);
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Removes the waiter for `correlation_id` without answering it.
    pub fn cancel(&self, correlation_id: u64) -> bool {
        self.requests.lock().remove(&correlation_id).is_some()
    }

    /// Drops every waiter; returns how many were released.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.requests.lock().drain().collect();
        drained.len()
    }

    /// Returns the number of waiting requests.
    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns `true` if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }
}

impl<T> Default for PendingRequests<T> {
    fn default() -> Self {
        Self::new()
    }
}
