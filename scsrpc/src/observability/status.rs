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

//! In-memory per-method call statistics.

use crate::dispatch::{BoxError, CallEvent, StatusRecorder};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregated statistics of one service method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodStatus {
    /// Calls recorded.
    pub calls: u64,
    /// Calls that returned an error, timeouts included.
    pub errors: u64,
    /// Calls that timed out.
    pub timeouts: u64,
    /// Sum of reported elapsed times in milliseconds.
    pub total_elapsed_ms: u64,
    /// Largest reported elapsed time in milliseconds.
    pub max_elapsed_ms: u64,
    /// Sum of reported item counts.
    pub total_count: u64,
}

impl MethodStatus {
    fn record(&mut self, event: &CallEvent) {
        self.calls += 1;
        if event.is_error() {
            self.errors += 1;
        }
        if event.is_timeout() {
            self.timeouts += 1;
        }
        self.total_elapsed_ms = self.total_elapsed_ms.saturating_add(event.elapsed_time);
        self.max_elapsed_ms = self.max_elapsed_ms.max(event.elapsed_time);
        self.total_count = self.total_count.saturating_add(u64::from(event.count));
    }

    fn merge(&mut self, other: &MethodStatus) {
        self.calls += other.calls;
        self.errors += other.errors;
        self.timeouts += other.timeouts;
        self.total_elapsed_ms = self.total_elapsed_ms.saturating_add(other.total_elapsed_ms);
        self.max_elapsed_ms = self.max_elapsed_ms.max(other.max_elapsed_ms);
        self.total_count = self.total_count.saturating_add(other.total_count);
    }

    /// Mean elapsed time in milliseconds, 0 when nothing was recorded.
    pub fn average_elapsed_ms(&self) -> u64 {
        if self.calls == 0 {
            0
        } else {
            self.total_elapsed_ms / self.calls
        }
    }
}

/// Service and method a [`MethodStatus`] belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodKey {
    /// Service name.
    pub service: String,
    /// Method name.
    pub method: String,
}

/// [`StatusRecorder`] keeping running totals per service method.
///
/// # Examples
///
/// ```rust
/// use scsrpc::observability::StatusCounter;
///
/// let counter = StatusCounter::new();
/// assert!(counter.snapshot().is_empty());
/// assert_eq!(counter.totals().calls, 0);
/// ```
#[derive(Debug, Default)]
pub struct StatusCounter {
    methods: Mutex<HashMap<MethodKey, MethodStatus>>,
}

impl StatusCounter {
    /// Creates an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics for one method, if it was ever called.
    pub fn method(&self, service: &str, method: &str) -> Option<MethodStatus> {
        let key = MethodKey {
            service: service.to_string(),
            method: method.to_string(),
        };
        self.methods.lock().get(&key).cloned()
    }

    /// All methods, sorted by service then method.
    pub fn snapshot(&self) -> Vec<(MethodKey, MethodStatus)> {
        let mut entries: Vec<_> = self
            .methods
            .lock()
            .iter()
            .map(|(key, status)| (key.clone(), status.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Statistics summed over every method.
    pub fn totals(&self) -> MethodStatus {
        let mut totals = MethodStatus::default();
        for status in self.methods.lock().values() {
            totals.merge(status);
        }
        totals
    }

    /// Forgets everything recorded so far.
    pub fn reset(&self) {
        self.methods.lock().clear();
    }
}

impl StatusRecorder for StatusCounter {
    fn record(&self, event: &CallEvent) -> Result<(), BoxError> {
        let key = MethodKey {
            service: event.caller.service_name.clone(),
            method: event.caller.method_name.clone(),
        };
        self.methods.lock().entry(key).or_default().record(event);
        Ok(())
    }
}
