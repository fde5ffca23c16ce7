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

//! Correlation id allocation for outgoing requests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates correlation ids for requests sent by one caller.
///
/// Ids start at 1 and increase monotonically; 0 never names a request, so
/// it is free for messages that answer nothing. Lock-free and shareable
/// across tasks.
///
/// # Example
///
/// ```rust
/// use scsrpc::channel::CorrelationIdGenerator;
///
/// let generator = CorrelationIdGenerator::new();
/// assert_eq!(generator.next(), 1);
/// assert_eq!(generator.next(), 2);
/// assert_eq!(generator.peek(), 3);
/// ```
#[derive(Debug)]
pub struct CorrelationIdGenerator {
    next_id: AtomicU64,
}

impl CorrelationIdGenerator {
    /// Creates a generator whose first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates the next id.
    #[must_use]
    pub fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the id the next call to [`next`](Self::next) would allocate.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

impl Default for CorrelationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let generator = CorrelationIdGenerator::new();
        assert_eq!(generator.peek(), 1);
        assert_eq!(generator.next(), 1);
        assert_eq!(generator.next(), 2);
        assert_eq!(generator.peek(), 3);
    }

    #[tokio::test]
    async fn test_ids_unique_across_tasks() {
        let generator = Arc::new(CorrelationIdGenerator::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let generator = Arc::clone(&generator);
            handles.push(tokio::spawn(async move {
                (0..250).map(|_| generator.next()).collect::<Vec<_>>()
            }));
        }

        let mut all_ids = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(all_ids.insert(id), "Duplicate correlation id {}", id);
            }
        }
        assert_eq!(all_ids.len(), 2000);
        assert!(!all_ids.contains(&0));
    }
}
