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

//! Bound on concurrently dispatched calls.

use super::error::DispatchError;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate admitting at most `max` calls at once.
///
/// A [`GatePermit`] is held for the whole dispatch of one call, from before
/// the invocation until the answer is written. Dropping the permit releases
/// the slot, which covers early returns, errors and panics alike.
///
/// # Examples
///
/// ```rust
/// use scsrpc::dispatch::ConcurrencyGate;
/// use std::num::NonZeroUsize;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gate = ConcurrencyGate::new(NonZeroUsize::new(2).ok_or("zero slots")?);
/// let permit = gate.acquire().await?;
/// assert_eq!(gate.in_flight(), 1);
/// drop(permit);
/// assert_eq!(gate.in_flight(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max: usize,
    acquisitions: AtomicU64,
    wait_time_us: AtomicU64,
}

/// Point-in-time view of a gate's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateMetrics {
    /// Total successful acquisitions.
    pub acquisitions: u64,
    /// Cumulative time spent waiting for a slot.
    pub total_wait: Duration,
    /// Calls holding a slot when the snapshot was taken.
    pub in_flight: usize,
}

/// One admitted call. Releases its slot on drop.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Creates a gate admitting `max` concurrent calls.
    pub fn new(max: NonZeroUsize) -> Self {
        let max = max.get();
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
            acquisitions: AtomicU64::new(0),
            wait_time_us: AtomicU64::new(0),
        }
    }

    /// Waits for a free slot.
    ///
    /// Fails only after [`close`](Self::close).
    pub async fn acquire(&self) -> Result<GatePermit, DispatchError> {
        let start = Instant::now();
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::GateClosed)?;

        let waited = start.elapsed().as_micros().min(u128::from(u64::MAX)) as u64;
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        self.wait_time_us.fetch_add(waited, Ordering::Relaxed);

        Ok(GatePermit { _permit: permit })
    }

    /// Takes a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<GatePermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        Some(GatePermit { _permit: permit })
    }

    /// Stops admitting calls. Waiters and later acquires fail with
    /// [`DispatchError::GateClosed`]; held permits stay valid.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Free slots.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Calls currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max.saturating_sub(self.semaphore.available_permits())
    }

    /// Configured bound.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Total successful acquisitions.
    pub fn total_acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Snapshot of the gate's counters.
    pub fn metrics(&self) -> GateMetrics {
        GateMetrics {
            acquisitions: self.total_acquisitions(),
            total_wait: Duration::from_micros(self.wait_time_us.load(Ordering::Relaxed)),
            in_flight: self.in_flight(),
        }
    }

    /// Average time spent waiting for a slot.
    pub fn average_wait(&self) -> Duration {
        let count = self.total_acquisitions();
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.wait_time_us.load(Ordering::Relaxed) / count)
    }
}
