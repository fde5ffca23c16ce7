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

//! Dispatcher configuration.

use crate::transport::TransportError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of calls executing at once.
pub const DEFAULT_MAX_CALLER: usize = 100;

/// Default name of the self-check service excluded from call statistics.
pub const DEFAULT_STATUS_SERVICE: &str = "StatusService";

/// Configuration for a [`ServiceChannel`](super::ServiceChannel).
///
/// # Examples
///
/// ```rust
/// use scsrpc::dispatch::DispatcherConfig;
/// use std::time::Duration;
///
/// let config = DispatcherConfig::new()
///     .with_timeout_secs(5)
///     .with_max_caller(16);
///
/// assert_eq!(config.timeout(), Duration::from_secs(5));
/// assert_eq!(config.timeout_millis(), 5_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Per-call timeout, in whole seconds.
    pub timeout_secs: u64,

    /// Maximum number of calls executing at once.
    pub max_caller: usize,

    /// Service whose calls are not recorded or published.
    pub status_service: String,

    /// Capacity of the call-event broadcast; slow subscribers lose the
    /// oldest events.
    pub callback_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_caller: DEFAULT_MAX_CALLER,
            status_service: DEFAULT_STATUS_SERVICE.to_string(),
            callback_capacity: 1024,
        }
    }
}

impl DispatcherConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-call timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the concurrency bound.
    pub fn with_max_caller(mut self, max_caller: usize) -> Self {
        self.max_caller = max_caller;
        self
    }

    /// Sets the status service name.
    pub fn with_status_service(mut self, name: impl Into<String>) -> Self {
        self.status_service = name.into();
        self
    }

    /// Sets the call-event broadcast capacity.
    pub fn with_callback_capacity(mut self, capacity: usize) -> Self {
        self.callback_capacity = capacity;
        self
    }

    /// Returns the per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Returns the per-call timeout in milliseconds, as reported by
    /// synthesized timeout results.
    pub fn timeout_millis(&self) -> u64 {
        self.timeout_secs.saturating_mul(1000)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidConfiguration`] for a zero timeout,
    /// concurrency bound or callback capacity.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.timeout_secs == 0 {
            return Err(TransportError::InvalidConfiguration {
                reason: "timeout_secs must be greater than 0".to_string(),
            });
        }
        if self.max_caller == 0 {
            return Err(TransportError::InvalidConfiguration {
                reason: "max_caller must be greater than 0".to_string(),
            });
        }
        if self.callback_capacity == 0 {
            return Err(TransportError::InvalidConfiguration {
                reason: "callback_capacity must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
