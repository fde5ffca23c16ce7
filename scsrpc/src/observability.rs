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

//! Metrics and call statistics.
//!
//! [`TransportMetrics`] and [`CallMetrics`] are lock-free counters, mirrored
//! to the `metrics` facade when the `observability` feature is enabled.
//! [`StatusCounter`] aggregates finished calls per service method and is the
//! default status recorder of [`ScsServer`](crate::ScsServer).

mod metrics;
mod status;

pub use metrics::{CallMetrics, TransportMetrics};
pub use status::{MethodKey, MethodStatus, StatusCounter};
